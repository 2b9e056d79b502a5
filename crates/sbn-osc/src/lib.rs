//! # sbn-osc
//!
//! Sterile-neutrino sensitivity for short-baseline samples: binned signal and
//! background per detector, a two-flavour oscillation transform, and a
//! chi-square scan over (sin²2θ, Δm²) with a fractional covariance matrix.
//!
//! ## Example
//!
//! ```
//! use sbn_osc::{Chi2Sensitivity, FixedCovariance, OscType, SampleConfig, SensitivityConfig};
//!
//! let cfg = SensitivityConfig::new(5, 5, [-3.0, 0.0], [-1.0, 2.0]).add_sample(
//!     SampleConfig::new("SBND", 6.6e20, &[0.2, 1.0, 3.0], &[0.2, 1.0, 3.0], &[0.09, 0.13])
//!         .osc_type(OscType::Appearance),
//! );
//! let mut sens = Chi2Sensitivity::new(cfg, Box::new(FixedCovariance::zeros(2)))?;
//! let nd = sens.sample_mut("SBND")?;
//! nd.add_pot(6.6e20);
//! nd.fill_signal(0.5, 0.6, 0.11, 50.0);
//! nd.fill_background(0.5, 100.0);
//! nd.fill_background(2.0, 80.0);
//!
//! let out = sens.finalize()?;
//! assert_eq!(out.chi2.len(), 5);
//! assert_eq!(out.contours.len(), 3);
//! # Ok::<(), sbn_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod contour;
pub mod covariance;
pub mod grid;
pub mod histogram;
pub mod oscillation;
pub mod output;
pub mod sample;
pub mod sensitivity;

pub use config::{ContourLevel, SampleConfig, SensitivityConfig};
pub use contour::Contour;
pub use covariance::{CovarianceSource, FixedCovariance, UniverseCovariance};
pub use histogram::{Hist1D, Hist3D};
pub use oscillation::{OscType, appearance_probability};
pub use output::{SampleSummary, SavedOscillation, SensitivityOutput};
pub use sample::{BackgroundEvent, EventSample, SignalEvent};
pub use sensitivity::{Chi2Sensitivity, Stage};
