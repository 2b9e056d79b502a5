//! Serializable result of a sensitivity run.

use std::path::Path;

use sbn_core::Result;
use serde::{Deserialize, Serialize};

use crate::contour::Contour;

/// Schema tag written with every output.
pub const SCHEMA_VERSION: &str = "sbn_chi2_sensitivity_v0";

/// Exposure bookkeeping and optional spectra of one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Sample name.
    pub name: String,
    /// Exposure that was filled.
    pub pot: f64,
    /// Target exposure.
    pub scale_pot: f64,
    /// `scale_pot / pot`.
    pub scale_factor: f64,
    /// Reco-energy bin edges.
    pub bins: Vec<f64>,
    /// Scaled signal spectrum, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Vec<f64>>,
    /// Scaled background spectrum, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Vec<f64>>,
}

/// Oscillated spectra of every sample at one grid point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedOscillation {
    /// sin²2θ.
    pub sin2theta: f64,
    /// Δm² (eV²).
    pub dm2: f64,
    /// Oscillated signal per sample, in configuration order.
    pub signal: Vec<Vec<f64>>,
}

/// Full sensitivity output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    /// Schema tag.
    pub schema_version: String,
    /// Reconstructed-energy definition the samples were filled with.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub energy_type: String,
    /// sin²2θ grid.
    pub sin2theta: Vec<f64>,
    /// Δm² grid (eV²).
    pub dm2: Vec<f64>,
    /// `chi2[i][j]` at `(dm2[i], sin2theta[j])`.
    pub chi2: Vec<Vec<f64>>,
    /// Contours, one per configured level.
    pub contours: Vec<Contour>,
    /// Per-sample bookkeeping.
    pub samples: Vec<SampleSummary>,
    /// Spectra at requested oscillation points.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oscillations: Vec<SavedOscillation>,
}

impl SensitivityOutput {
    /// Write pretty JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        std::fs::write(path, s)?;
        Ok(())
    }

    /// Contour with the given label.
    pub fn contour(&self, label: &str) -> Option<&Contour> {
        self.contours.iter().find(|c| c.label == label)
    }
}
