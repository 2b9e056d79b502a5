//! Per-detector event samples.
//!
//! A sample accumulates its selected signal in (reco E, true E, distance) so
//! that oscillations can be applied after the fact, and its background in
//! reco E only. Each sample tracks its own exposure and is rescaled to its
//! target exposure before samples are combined.

use sbn_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::config::SampleConfig;
use crate::histogram::{Hist1D, Hist3D};

/// cm → km.
const CM_PER_KM: f64 = 1e5;

/// A selected signal interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Reconstructed neutrino energy (GeV).
    pub reco_energy: f64,
    /// True neutrino energy (GeV).
    pub true_energy: f64,
    /// Interaction vertex in detector coordinates (cm).
    pub vertex: [f64; 3],
    /// Event weight.
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

/// A selected background interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundEvent {
    /// Reconstructed neutrino energy (GeV).
    pub reco_energy: f64,
    /// Event weight.
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

/// Binned signal and background of one detector.
#[derive(Debug, Clone)]
pub struct EventSample {
    config: SampleConfig,
    pot: f64,
    signal_factor: f64,
    background_factor: f64,
    signal: Hist3D,
    background: Hist1D,
}

impl EventSample {
    /// Empty sample.
    ///
    /// Signal fills are multiplied by `selection_efficiency` and background
    /// fills by `1 - background_rejection`.
    pub fn new(
        config: SampleConfig,
        selection_efficiency: f64,
        background_rejection: f64,
    ) -> Result<Self> {
        config.validate()?;
        let signal = Hist3D::new(&config.bins, &config.true_e_bins, &config.dist_bins)?;
        let background = Hist1D::new(&config.bins)?;
        Ok(Self {
            config,
            pot: 0.0,
            signal_factor: selection_efficiency,
            background_factor: 1.0 - background_rejection,
            signal,
            background,
        })
    }

    /// Sample name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Sample configuration.
    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    /// Accumulated exposure (POT).
    pub fn pot(&self) -> f64 {
        self.pot
    }

    /// Number of reconstructed-energy bins.
    pub fn n_bins(&self) -> usize {
        self.background.n_bins()
    }

    /// Record exposure from one input subrun.
    pub fn add_pot(&mut self, pot: f64) {
        self.pot += pot;
    }

    /// Whether a vertex (cm) lies inside the active volume.
    pub fn contains(&self, vertex: [f64; 3]) -> bool {
        let c = &self.config;
        [c.x_lim, c.y_lim, c.z_lim]
            .iter()
            .zip(vertex)
            .all(|(lim, v)| v > lim[0] && v < lim[1])
    }

    /// Distance (km) from the neutrino source to a vertex (cm).
    ///
    /// The source sits on the beam axis, `baseline` upstream of the front face.
    pub fn travel_distance(&self, vertex: [f64; 3]) -> f64 {
        let c = &self.config;
        let dx = vertex[0] - c.beam_center_x;
        let dy = vertex[1] - c.beam_center_y;
        let dz = c.baseline + vertex[2] - c.beam_front_z;
        (dx * dx + dy * dy + dz * dz).sqrt() / CM_PER_KM
    }

    /// Fill a signal entry at explicit coordinates.
    pub fn fill_signal(
        &mut self,
        reco_energy: f64,
        true_energy: f64,
        dist_km: f64,
        w: f64,
    ) -> bool {
        self.signal.fill(reco_energy, true_energy, dist_km, w * self.signal_factor)
    }

    /// Fill a signal interaction. Vertices outside the active volume are skipped.
    pub fn fill_signal_event(&mut self, ev: &SignalEvent) -> bool {
        if !self.contains(ev.vertex) {
            return false;
        }
        let dist = self.travel_distance(ev.vertex);
        self.fill_signal(ev.reco_energy, ev.true_energy, dist, ev.weight)
    }

    /// Fill a background entry.
    pub fn fill_background(&mut self, reco_energy: f64, w: f64) -> Option<usize> {
        self.background.fill(reco_energy, w * self.background_factor)
    }

    /// Fill a background interaction.
    pub fn fill_background_event(&mut self, ev: &BackgroundEvent) -> Option<usize> {
        self.fill_background(ev.reco_energy, ev.weight)
    }

    /// Unoscillated signal per reco bin.
    pub fn signal(&self) -> Vec<f64> {
        self.signal.project_x()
    }

    /// Background per reco bin.
    pub fn background(&self) -> Vec<f64> {
        self.background.bin_content.clone()
    }

    /// Signal per reco bin after oscillating with `(sin2theta, dm2)`.
    ///
    /// The oscillation weight of each cell is taken at its true-energy and
    /// distance bin centres.
    pub fn oscillate(&self, sin2theta: f64, dm2: f64) -> Vec<f64> {
        let osc = self.config.osc_type;
        let (nx, ny, nz) = self.signal.shape();
        let true_e = self.signal.y_centers();
        let dist = self.signal.z_centers();

        let mut factors = vec![0.0; ny * nz];
        for (j, &e) in true_e.iter().enumerate() {
            for (k, &l) in dist.iter().enumerate() {
                factors[j * nz + k] = osc.weight(sin2theta, dm2, l, e);
            }
        }

        (0..nx)
            .map(|i| {
                let row = &self.signal.bin_content[i * ny * nz..(i + 1) * ny * nz];
                row.iter().zip(&factors).map(|(c, f)| c * f).sum()
            })
            .collect()
    }

    /// Expected counts with no oscillation.
    pub fn null_prediction(&self) -> Vec<f64> {
        let mut out = self.background();
        if self.config.osc_type.signal_in_null() {
            for (o, s) in out.iter_mut().zip(self.signal()) {
                *o += s;
            }
        }
        out
    }

    /// Expected counts at `(sin2theta, dm2)`.
    pub fn prediction(&self, sin2theta: f64, dm2: f64) -> Vec<f64> {
        let mut out = self.background();
        for (o, s) in out.iter_mut().zip(self.oscillate(sin2theta, dm2)) {
            *o += s;
        }
        out
    }

    /// `scale_pot / pot`; fails unless the filled exposure is positive.
    pub fn scale_factor(&self) -> Result<f64> {
        if !(self.pot.is_finite() && self.pot > 0.0) {
            return Err(Error::Validation(format!(
                "sample '{}': cannot scale from {} POT",
                self.config.name, self.pot
            )));
        }
        Ok(self.config.scale_pot / self.pot)
    }

    /// Rescale to the configured target exposure. Returns the factor applied.
    pub fn scale(&mut self) -> Result<f64> {
        let factor = self.scale_factor()?;
        self.signal.scale(factor);
        self.background.scale(factor);
        if !self.config.energy_bin_scale.is_empty() {
            self.signal.scale_x_bins(&self.config.energy_bin_scale)?;
            self.background.scale_bins(&self.config.energy_bin_scale)?;
        }
        Ok(factor)
    }
}
