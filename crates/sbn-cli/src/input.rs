//! JSON inputs of the `sensitivity` command.

use std::path::Path;

use anyhow::{Context, Result};
use sbn_osc::{BackgroundEvent, Chi2Sensitivity, FixedCovariance, SensitivityConfig, SignalEvent};
use serde::Deserialize;

/// Selected events of one sample.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    /// Sample name, as in the configuration.
    pub name: String,
    /// Exposure the events correspond to.
    pub pot: f64,
    #[serde(default)]
    pub signal: Vec<SignalEvent>,
    #[serde(default)]
    pub background: Vec<BackgroundEvent>,
}

/// Events, covariance and optional data for a sensitivity run.
#[derive(Debug, Clone, Deserialize)]
pub struct SensitivityInput {
    pub samples: Vec<SampleInput>,
    /// Fractional covariance over all reco bins; statistics only if absent.
    #[serde(default)]
    pub covariance: Option<Vec<Vec<f64>>>,
    /// Observed counts over all reco bins; Asimov if absent.
    #[serde(default)]
    pub observed: Option<Vec<f64>>,
}

impl SensitivityInput {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Build the evaluator and fill it with the input events.
    pub fn into_sensitivity(self, config: SensitivityConfig) -> Result<Chi2Sensitivity> {
        let n_bins: usize = config.samples.iter().map(|s| s.bins.len().saturating_sub(1)).sum();
        let covariance = match &self.covariance {
            Some(rows) => FixedCovariance::from_rows(rows)?,
            None => FixedCovariance::zeros(n_bins),
        };
        let mut sens = Chi2Sensitivity::new(config, Box::new(covariance))?;

        for input in &self.samples {
            let sample = sens.sample_mut(&input.name)?;
            sample.add_pot(input.pot);
            let kept = input.signal.iter().filter(|ev| sample.fill_signal_event(ev)).count();
            for ev in &input.background {
                sample.fill_background_event(ev);
            }
            tracing::info!(
                sample = %input.name,
                signal = input.signal.len(),
                kept,
                background = input.background.len(),
                "filled sample"
            );
        }

        if let Some(data) = self.observed {
            sens.set_observed(data)?;
        }
        Ok(sens)
    }
}
