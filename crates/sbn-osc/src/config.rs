//! Configuration of the chi-square sensitivity scan.

use std::path::PathBuf;

use sbn_core::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::oscillation::OscType;

/// A chi-square level at which a contour is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourLevel {
    /// Label (e.g. `"90pct"`).
    pub label: String,
    /// Chi-square threshold.
    pub chi2: f64,
}

impl ContourLevel {
    /// Level at an explicit chi-square threshold.
    pub fn new(label: impl Into<String>, chi2: f64) -> Self {
        Self { label: label.into(), chi2 }
    }

    /// Level at confidence `cl` for `dof` degrees of freedom.
    pub fn from_confidence(label: impl Into<String>, cl: f64, dof: f64) -> Result<Self> {
        if !(cl > 0.0 && cl < 1.0) {
            return Err(Error::Validation(format!("confidence level must be in (0, 1), got {cl}")));
        }
        let dist = ChiSquared::new(dof)
            .map_err(|e| Error::Validation(format!("chi-square with {dof} dof: {e}")))?;
        Ok(Self::new(label, dist.inverse_cdf(cl)))
    }

    /// 90 %, 3σ and 5σ levels.
    pub fn defaults() -> Vec<Self> {
        vec![Self::new("90pct", 1.64), Self::new("3sigma", 7.74), Self::new("5sigma", 23.40)]
    }
}

fn default_lims() -> [f64; 2] {
    [f64::NEG_INFINITY, f64::INFINITY]
}

fn default_one() -> f64 {
    1.0
}

/// Per-detector event sample configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleConfig {
    /// Sample name.
    pub name: String,
    /// Distance from the neutrino source to the detector front face, in cm.
    #[serde(default)]
    pub baseline: f64,
    /// Beam centre in detector x, in cm.
    #[serde(default)]
    pub beam_center_x: f64,
    /// Beam centre in detector y, in cm.
    #[serde(default)]
    pub beam_center_y: f64,
    /// Detector front face along z, in cm.
    #[serde(default)]
    pub beam_front_z: f64,
    /// Active volume in x, in cm.
    #[serde(default = "default_lims")]
    pub x_lim: [f64; 2],
    /// Active volume in y, in cm.
    #[serde(default = "default_lims")]
    pub y_lim: [f64; 2],
    /// Active volume in z, in cm.
    #[serde(default = "default_lims")]
    pub z_lim: [f64; 2],
    /// Exposure to scale the sample to, in POT.
    pub scale_pot: f64,
    /// Oscillation channel.
    #[serde(default)]
    pub osc_type: OscType,
    /// Optional extra factor per reconstructed-energy bin.
    #[serde(default)]
    pub energy_bin_scale: Vec<f64>,
    /// Reconstructed-energy bin edges, in GeV.
    pub bins: Vec<f64>,
    /// True-energy bin edges, in GeV.
    pub true_e_bins: Vec<f64>,
    /// Travel-distance bin edges, in km.
    pub dist_bins: Vec<f64>,
}

impl SampleConfig {
    /// Minimal sample with a single distance bin spanning `[0, max_km)`.
    pub fn new(
        name: impl Into<String>,
        scale_pot: f64,
        bins: &[f64],
        true_e_bins: &[f64],
        dist_bins: &[f64],
    ) -> Self {
        Self {
            name: name.into(),
            baseline: 0.0,
            beam_center_x: 0.0,
            beam_center_y: 0.0,
            beam_front_z: 0.0,
            x_lim: default_lims(),
            y_lim: default_lims(),
            z_lim: default_lims(),
            scale_pot,
            osc_type: OscType::None,
            energy_bin_scale: Vec::new(),
            bins: bins.to_vec(),
            true_e_bins: true_e_bins.to_vec(),
            dist_bins: dist_bins.to_vec(),
        }
    }

    /// Set the oscillation channel.
    pub fn osc_type(mut self, osc_type: OscType) -> Self {
        self.osc_type = osc_type;
        self
    }

    /// Set the source-to-front-face distance (cm).
    pub fn baseline(mut self, baseline_cm: f64) -> Self {
        self.baseline = baseline_cm;
        self
    }

    /// Set the beam centre and front face (cm).
    pub fn beam(mut self, center_x: f64, center_y: f64, front_z: f64) -> Self {
        self.beam_center_x = center_x;
        self.beam_center_y = center_y;
        self.beam_front_z = front_z;
        self
    }

    /// Set the active volume (cm).
    pub fn active_volume(mut self, x: [f64; 2], y: [f64; 2], z: [f64; 2]) -> Self {
        self.x_lim = x;
        self.y_lim = y;
        self.z_lim = z;
        self
    }

    /// Set per-bin energy scale factors.
    pub fn energy_bin_scale(mut self, factors: &[f64]) -> Self {
        self.energy_bin_scale = factors.to_vec();
        self
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Error::Validation(format!("sample '{}': {msg}", self.name));
        if self.name.is_empty() {
            return Err(Error::Validation("sample with empty name".into()));
        }
        if !(self.scale_pot.is_finite() && self.scale_pot > 0.0) {
            return Err(bad(format!("scale_pot must be positive, got {}", self.scale_pot)));
        }
        let axes = [
            ("bins", &self.bins),
            ("true_e_bins", &self.true_e_bins),
            ("dist_bins", &self.dist_bins),
        ];
        for (axis, edges) in axes {
            if edges.len() < 2 || edges.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(bad(format!("{axis} must be at least 2 increasing edges")));
            }
        }
        if !self.energy_bin_scale.is_empty() && self.energy_bin_scale.len() != self.bins.len() - 1
        {
            return Err(bad(format!(
                "energy_bin_scale has {} entries for {} bins",
                self.energy_bin_scale.len(),
                self.bins.len() - 1
            )));
        }
        for (axis, lim) in [("x_lim", self.x_lim), ("y_lim", self.y_lim), ("z_lim", self.z_lim)] {
            if !(lim[0] < lim[1]) {
                return Err(bad(format!("{axis} must satisfy lo < hi, got {lim:?}")));
            }
        }
        Ok(())
    }
}

/// Sensitivity scan configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SensitivityConfig {
    /// Number of Δm² grid points.
    pub num_dm2: usize,
    /// Number of sin²2θ grid points.
    pub num_sin: usize,
    /// log10 range of Δm² (eV²).
    pub log_dm2_lims: [f64; 2],
    /// log10 range of sin²2θ.
    pub log_sin_lims: [f64; 2],
    /// Reconstructed-energy definition used to fill the samples; copied into
    /// the output.
    #[serde(default)]
    pub energy_type: String,
    /// Fraction of signal events that survive the selection.
    #[serde(default = "default_one")]
    pub selection_efficiency: f64,
    /// Fraction of background events removed by the selection.
    #[serde(default)]
    pub background_rejection: f64,
    /// Output JSON path; nothing is written if unset.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    /// Include per-sample signal spectra in the output.
    #[serde(default)]
    pub save_signal: bool,
    /// Include per-sample background spectra in the output.
    #[serde(default)]
    pub save_background: bool,
    /// `[sin²2θ, Δm²]` points at which to save oscillated spectra.
    #[serde(default)]
    pub save_oscillations: Vec<[f64; 2]>,
    /// Contour levels; 90 %, 3σ and 5σ if omitted.
    #[serde(default = "ContourLevel::defaults")]
    pub contour_levels: Vec<ContourLevel>,
    /// Event samples, in covariance-matrix order.
    pub samples: Vec<SampleConfig>,
}

impl SensitivityConfig {
    /// Grid configuration with default options and no samples.
    pub fn new(
        num_sin: usize,
        num_dm2: usize,
        log_sin_lims: [f64; 2],
        log_dm2_lims: [f64; 2],
    ) -> Self {
        Self {
            num_dm2,
            num_sin,
            log_dm2_lims,
            log_sin_lims,
            energy_type: String::new(),
            selection_efficiency: 1.0,
            background_rejection: 0.0,
            output_file: None,
            save_signal: false,
            save_background: false,
            save_oscillations: Vec::new(),
            contour_levels: ContourLevel::defaults(),
            samples: Vec::new(),
        }
    }

    /// Add a sample.
    pub fn add_sample(mut self, sample: SampleConfig) -> Self {
        self.samples.push(sample);
        self
    }

    /// Set the output path.
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Replace the contour levels.
    pub fn contour_levels(mut self, levels: Vec<ContourLevel>) -> Self {
        self.contour_levels = levels;
        self
    }

    /// Read a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let cfg: Self = serde_json::from_slice(&bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.num_sin < 2 || self.num_dm2 < 2 {
            return Err(Error::Validation(format!(
                "grid needs at least 2x2 points, got {}x{}",
                self.num_sin, self.num_dm2
            )));
        }
        let axes = [("log_sin_lims", self.log_sin_lims), ("log_dm2_lims", self.log_dm2_lims)];
        for (axis, lims) in axes {
            if !(lims[0].is_finite() && lims[1].is_finite() && lims[0] < lims[1]) {
                return Err(Error::Validation(format!("{axis} must be finite with lo < hi")));
            }
        }
        if !(self.selection_efficiency > 0.0 && self.selection_efficiency <= 1.0) {
            return Err(Error::Validation(format!(
                "selection_efficiency must be in (0, 1], got {}",
                self.selection_efficiency
            )));
        }
        if !(0.0..1.0).contains(&self.background_rejection) {
            return Err(Error::Validation(format!(
                "background_rejection must be in [0, 1), got {}",
                self.background_rejection
            )));
        }
        if self.samples.is_empty() {
            return Err(Error::Validation("no event samples configured".into()));
        }
        for s in &self.samples {
            s.validate()?;
        }
        let mut names: Vec<&str> = self.samples.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::Validation("sample names must be unique".into()));
        }
        if self.contour_levels.iter().any(|l| !(l.chi2.is_finite() && l.chi2 > 0.0)) {
            return Err(Error::Validation("contour levels must be positive".into()));
        }
        Ok(())
    }
}
