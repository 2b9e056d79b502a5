//! Chi-square sensitivity over a log-spaced (sin²2θ, Δm²) grid.
//!
//! Samples are filled first. [`Chi2Sensitivity::finalize`] then runs the
//! stages strictly in order:
//!
//! 1. [`finalize_covariance`](Chi2Sensitivity::finalize_covariance): close out
//!    the fractional covariance
//! 2. [`scale`](Chi2Sensitivity::scale): rescale each sample to its target POT
//! 3. [`compute_chi2`](Chi2Sensitivity::compute_chi2): fill the surface
//! 4. [`compute_contours`](Chi2Sensitivity::compute_contours): extract contours
//! 5. [`write`](Chi2Sensitivity::write): assemble and emit the output
//!
//! Each stage returns [`Error::Stage`] unless the previous one completed.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use sbn_core::{Error, Result};

use crate::config::SensitivityConfig;
use crate::contour::{self, Contour};
use crate::covariance::{self, CovarianceSource};
use crate::grid::log_grid;
use crate::output::{SCHEMA_VERSION, SampleSummary, SavedOscillation, SensitivityOutput};
use crate::sample::EventSample;

/// Finalize progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Samples are being filled.
    Filling,
    /// Fractional covariance is available.
    Covariance,
    /// Samples are scaled to their target exposure.
    Scaled,
    /// Chi-square surface is filled.
    Chi2,
    /// Contours are extracted.
    Contours,
    /// Output is assembled (and written, if configured).
    Written,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Filling => "filling",
            Stage::Covariance => "covariance",
            Stage::Scaled => "scaled",
            Stage::Chi2 => "chi2",
            Stage::Contours => "contours",
            Stage::Written => "written",
        };
        f.write_str(s)
    }
}

/// Sensitivity evaluator.
pub struct Chi2Sensitivity {
    config: SensitivityConfig,
    samples: Vec<EventSample>,
    covariance: Box<dyn CovarianceSource>,
    observed: Option<Vec<f64>>,
    stage: Stage,

    sin2theta: Vec<f64>,
    dm2: Vec<f64>,
    fractional: Option<DMatrix<f64>>,
    scale_factors: Vec<f64>,
    chi2: Vec<Vec<f64>>,
    contours: Vec<Contour>,
    output: Option<SensitivityOutput>,
}

impl Chi2Sensitivity {
    /// Evaluator with empty samples built from `config`.
    pub fn new(config: SensitivityConfig, covariance: Box<dyn CovarianceSource>) -> Result<Self> {
        config.validate()?;
        let samples = config
            .samples
            .iter()
            .map(|s| {
                EventSample::new(
                    s.clone(),
                    config.selection_efficiency,
                    config.background_rejection,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let sin2theta = log_grid(config.log_sin_lims, config.num_sin);
        let dm2 = log_grid(config.log_dm2_lims, config.num_dm2);
        Ok(Self {
            config,
            samples,
            covariance,
            observed: None,
            stage: Stage::Filling,
            sin2theta,
            dm2,
            fractional: None,
            scale_factors: Vec::new(),
            chi2: Vec::new(),
            contours: Vec::new(),
            output: None,
        })
    }

    /// Configuration.
    pub fn config(&self) -> &SensitivityConfig {
        &self.config
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Samples in configuration order.
    pub fn samples(&self) -> &[EventSample] {
        &self.samples
    }

    /// Sample by name, for filling.
    pub fn sample_mut(&mut self, name: &str) -> Result<&mut EventSample> {
        if self.stage != Stage::Filling {
            return Err(Error::Stage(format!("cannot fill samples at stage {}", self.stage)));
        }
        self.samples
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| Error::Validation(format!("unknown sample '{name}'")))
    }

    /// Total reco bins over all samples.
    pub fn n_bins(&self) -> usize {
        self.samples.iter().map(|s| s.n_bins()).sum()
    }

    /// Compare against observed counts instead of the Asimov null prediction.
    ///
    /// `counts` covers all samples, concatenated, after scaling.
    pub fn set_observed(&mut self, counts: Vec<f64>) -> Result<()> {
        if self.stage > Stage::Scaled {
            return Err(Error::Stage(format!("cannot set data at stage {}", self.stage)));
        }
        if counts.len() != self.n_bins() {
            return Err(Error::Validation(format!(
                "observed data has {} bins, samples have {}",
                counts.len(),
                self.n_bins()
            )));
        }
        self.observed = Some(counts);
        Ok(())
    }

    /// sin²2θ grid.
    pub fn sin2theta(&self) -> &[f64] {
        &self.sin2theta
    }

    /// Δm² grid.
    pub fn dm2(&self) -> &[f64] {
        &self.dm2
    }

    /// Chi-square surface, `[dm2][sin2theta]`. Empty before [`Self::compute_chi2`].
    pub fn chi2_surface(&self) -> &[Vec<f64>] {
        &self.chi2
    }

    /// Extracted contours.
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Assembled output, after [`Self::write`].
    pub fn output(&self) -> Option<&SensitivityOutput> {
        self.output.as_ref()
    }

    fn require(&self, expected: Stage, op: &str) -> Result<()> {
        if self.stage != expected {
            return Err(Error::Stage(format!(
                "{op} requires stage {expected}, current stage is {}",
                self.stage
            )));
        }
        Ok(())
    }

    /// Close out covariance accumulation.
    pub fn finalize_covariance(&mut self) -> Result<()> {
        self.require(Stage::Filling, "finalize_covariance")?;
        let f = self.covariance.finalize()?;
        let n = self.n_bins();
        if f.nrows() != n || f.ncols() != n {
            return Err(Error::Validation(format!(
                "covariance is {}x{} but samples have {n} bins",
                f.nrows(),
                f.ncols()
            )));
        }
        self.fractional = Some(f);
        self.stage = Stage::Covariance;
        log::info!("covariance finalized over {n} bins");
        Ok(())
    }

    /// Rescale every sample to its target exposure.
    ///
    /// Every sample's exposure is checked first; on error no sample has been
    /// rescaled and the stage is unchanged.
    pub fn scale(&mut self) -> Result<()> {
        self.require(Stage::Covariance, "scale")?;
        for s in &self.samples {
            s.scale_factor()?;
        }
        let mut factors = Vec::with_capacity(self.samples.len());
        for s in &mut self.samples {
            let pot = s.pot();
            let factor = s.scale()?;
            log::info!(
                "{}: POT {pot:e} to {:e}, factor {factor}",
                s.name(),
                s.config().scale_pot
            );
            factors.push(factor);
        }
        self.scale_factors = factors;
        self.stage = Stage::Scaled;
        Ok(())
    }

    /// Fill the chi-square surface.
    ///
    /// The covariance is evaluated at the null prediction; data is the
    /// observed counts if set, otherwise the null prediction itself.
    pub fn compute_chi2(&mut self) -> Result<()> {
        self.require(Stage::Scaled, "compute_chi2")?;
        let fractional = self
            .fractional
            .as_ref()
            .ok_or_else(|| Error::Stage("covariance missing".into()))?;

        let null: Vec<f64> = self.samples.iter().flat_map(|s| s.null_prediction()).collect();
        let data = DVector::from_vec(self.observed.clone().unwrap_or_else(|| null.clone()));
        let inv = covariance::invert(covariance::absolute_covariance(fractional, &null)?)?;

        let samples = &self.samples;
        let sin2theta = &self.sin2theta;
        let chi2: Vec<Vec<f64>> = self
            .dm2
            .par_iter()
            .map(|&m| {
                sin2theta
                    .iter()
                    .map(|&s| {
                        let pred = samples.iter().flat_map(|smp| smp.prediction(s, m));
                        let diff = DVector::from_iterator(data.len(), pred)
                            .zip_map(&data, |p, d| d - p);
                        diff.dot(&(&inv * &diff))
                    })
                    .collect()
            })
            .collect();

        if chi2.iter().flatten().any(|c| !c.is_finite()) {
            return Err(Error::Computation("chi-square surface has non-finite values".into()));
        }
        log::info!("chi-square surface {}x{} filled", self.dm2.len(), self.sin2theta.len());
        self.chi2 = chi2;
        self.stage = Stage::Chi2;
        Ok(())
    }

    /// Extract a contour for each configured level.
    pub fn compute_contours(&mut self) -> Result<()> {
        self.require(Stage::Chi2, "compute_contours")?;
        self.contours = self
            .config
            .contour_levels
            .iter()
            .map(|level| contour::extract(&self.sin2theta, &self.dm2, &self.chi2, level))
            .collect();
        for c in &self.contours {
            log::info!("contour {}: {} points", c.label, c.len());
        }
        self.stage = Stage::Contours;
        Ok(())
    }

    /// Assemble the output and write it to `output_file`, if configured.
    pub fn write(&mut self) -> Result<()> {
        self.require(Stage::Contours, "write")?;
        let samples = self
            .samples
            .iter()
            .zip(&self.scale_factors)
            .map(|(s, &factor)| SampleSummary {
                name: s.name().to_string(),
                pot: s.pot(),
                scale_pot: s.config().scale_pot,
                scale_factor: factor,
                bins: s.config().bins.clone(),
                signal: self.config.save_signal.then(|| s.signal()),
                background: self.config.save_background.then(|| s.background()),
            })
            .collect();
        let oscillations = self
            .config
            .save_oscillations
            .iter()
            .map(|&[s, m]| SavedOscillation {
                sin2theta: s,
                dm2: m,
                signal: self.samples.iter().map(|smp| smp.oscillate(s, m)).collect(),
            })
            .collect();
        let out = SensitivityOutput {
            schema_version: SCHEMA_VERSION.to_string(),
            energy_type: self.config.energy_type.clone(),
            sin2theta: self.sin2theta.clone(),
            dm2: self.dm2.clone(),
            chi2: self.chi2.clone(),
            contours: self.contours.clone(),
            samples,
            oscillations,
        };
        if let Some(path) = &self.config.output_file {
            out.write(path)?;
            log::info!("wrote {}", path.display());
        }
        self.output = Some(out);
        self.stage = Stage::Written;
        Ok(())
    }

    /// Run every remaining stage in order.
    pub fn finalize(&mut self) -> Result<&SensitivityOutput> {
        self.finalize_covariance()?;
        self.scale()?;
        self.compute_chi2()?;
        self.compute_contours()?;
        self.write()?;
        self.output.as_ref().ok_or_else(|| Error::Stage("output missing after write".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleConfig;
    use crate::covariance::FixedCovariance;
    use crate::oscillation::OscType;

    fn config() -> SensitivityConfig {
        SensitivityConfig::new(4, 3, [-2.0, 0.0], [-1.0, 1.0]).add_sample(
            SampleConfig::new("ND", 1e20, &[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], &[0.0, 0.2])
                .osc_type(OscType::Disappearance),
        )
    }

    fn filled() -> Chi2Sensitivity {
        let mut sens = Chi2Sensitivity::new(config(), Box::new(FixedCovariance::zeros(2))).unwrap();
        let s = sens.sample_mut("ND").unwrap();
        s.add_pot(1e20);
        s.fill_signal(0.5, 0.5, 0.1, 100.0);
        s.fill_signal(1.5, 1.5, 0.1, 100.0);
        s.fill_background(0.5, 10.0);
        sens
    }

    #[test]
    fn test_stage_order_enforced() {
        let mut sens = filled();
        assert!(matches!(sens.scale(), Err(Error::Stage(_))));
        assert!(matches!(sens.compute_chi2(), Err(Error::Stage(_))));
        assert!(matches!(sens.write(), Err(Error::Stage(_))));
        sens.finalize_covariance().unwrap();
        assert!(matches!(sens.finalize_covariance(), Err(Error::Stage(_))));
        assert!(matches!(sens.sample_mut("ND"), Err(Error::Stage(_))));
        sens.scale().unwrap();
        assert_eq!(sens.stage(), Stage::Scaled);
    }

    #[test]
    fn test_covariance_shape_checked() {
        let mut sens = Chi2Sensitivity::new(config(), Box::new(FixedCovariance::zeros(3))).unwrap();
        assert!(matches!(sens.finalize_covariance(), Err(Error::Validation(_))));
        assert_eq!(sens.stage(), Stage::Filling);
    }

    #[test]
    fn test_asimov_surface() {
        let mut sens = filled();
        let out = sens.finalize().unwrap();
        assert_eq!(out.chi2.len(), 3);
        assert!(out.chi2.iter().all(|row| row.len() == 4));
        assert!(out.chi2.iter().flatten().all(|&c| c >= 0.0));
        assert_eq!(out.samples[0].scale_factor, 1.0);
        assert!(out.samples[0].signal.is_none());
        assert_eq!(sens.stage(), Stage::Written);
    }

    #[test]
    fn test_observed_length() {
        let mut sens = filled();
        assert!(sens.set_observed(vec![1.0]).is_err());
        sens.set_observed(vec![110.0, 100.0]).unwrap();
        sens.finalize().unwrap();
        assert!(matches!(sens.set_observed(vec![1.0, 1.0]), Err(Error::Stage(_))));
    }

    #[test]
    fn test_unknown_sample() {
        let mut sens = filled();
        assert!(matches!(sens.sample_mut("FD"), Err(Error::Validation(_))));
    }
}
