//! # sbn-syst
//!
//! Systematic reweighting from precomputed weight universes.
//!
//! - [`UniverseRegistry`]: knob name → universe indices and shift values
//! - [`UniverseWeight`]: combined weight of several systematics in one universe
//! - [`WeightSyst`]: continuous sigma shifts by interpolating between universes
//! - [`SystCatalog`]: the fixed list of supported systematics
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use sbn_core::{Multiverse, Slice, Systematic};
//! use sbn_syst::{KnobUniverses, UniverseRegistry, UniverseWeight, WeightSyst};
//!
//! let reg = Arc::new(UniverseRegistry::new(vec![
//!     KnobUniverses::new("QEMA", vec![-2.0, -1.0, 0.0, 1.0, 2.0]),
//! ])?);
//! let sr = Slice::simulated(0, vec![Multiverse::new(vec![0.9, 0.95, 1.0, 1.05, 1.1])]);
//!
//! let w = UniverseWeight::new(["QEMA"], 3, reg.clone())?.weight(&sr)?;
//! assert!((w - 1.05).abs() < 1e-6);
//!
//! let mut w = 1.0;
//! WeightSyst::new("QEMA", reg).shift(1.3, &sr, &mut w)?;
//! assert!((w - 1.065).abs() < 1e-6);
//! # Ok::<(), sbn_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod nonres;
pub mod registry;
pub mod shift;
pub mod weight;

pub use catalog::{GENIE_KNOBS, SystCatalog, sbn_genie_weight_systs};
pub use nonres::{Current, NonResKnob, Nucleon, PionCount};
pub use registry::{
    ClosestShift, KnobUniverses, ManifestFile, Side, UniverseLookup, UniverseManifest,
    UniverseRegistry, UniverseSource,
};
pub use shift::{Univs, UnivsCache, WeightSyst};
pub use weight::UniverseWeight;
