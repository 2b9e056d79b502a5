//! Universe registry: knob name → universe set.
//!
//! Each knob owns an ordered list of universes, and each universe is tagged
//! with the parameter shift (in sigma) it was generated at. The per-event
//! weights live in the event record, indexed by the knob's registry index.
//!
//! The registry is built once from a [`UniverseSource`] and is immutable
//! afterwards; it is shared between weight calculators as an
//! `Arc<dyn UniverseLookup>`. A process-wide instance can be installed with
//! [`install_global`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use sbn_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Which side of the query value a neighbouring universe must lie on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Shift value at or below the query.
    Below,
    /// Shift value at or above the query.
    Above,
}

/// A universe found by [`UniverseLookup::closest_shift_index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestShift {
    /// Universe index.
    pub index: usize,
    /// Shift value the universe was generated at.
    pub shift: f64,
}

/// Read-only queries against a universe catalog.
pub trait UniverseLookup: Send + Sync {
    /// Knob names in registry order.
    fn systs(&self) -> &[String];

    /// Registry index of `knob`; [`Error::UnknownSystematic`] if absent.
    fn syst_index(&self, knob: &str) -> Result<usize>;

    /// Nearest universe of `knob` on `side` of `shift`, or `None` if that side is empty.
    fn closest_shift_index(&self, knob: &str, shift: f64, side: Side)
    -> Result<Option<ClosestShift>>;
}

/// Universe set of a single knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnobUniverses {
    /// Knob name.
    pub name: String,
    /// Shift value of each universe, in universe order.
    pub shifts: Vec<f64>,
}

impl KnobUniverses {
    /// Create a knob entry.
    pub fn new(name: impl Into<String>, shifts: impl Into<Vec<f64>>) -> Self {
        Self { name: name.into(), shifts: shifts.into() }
    }
}

/// On-disk universe manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniverseManifest {
    /// Knobs in registry order; position is the knob's weight-vector index.
    pub knobs: Vec<KnobUniverses>,
}

/// Where a registry gets its catalog from.
pub trait UniverseSource {
    /// Produce the knob list in registry order.
    fn load(&self) -> Result<Vec<KnobUniverses>>;
}

impl UniverseSource for Vec<KnobUniverses> {
    fn load(&self) -> Result<Vec<KnobUniverses>> {
        Ok(self.clone())
    }
}

impl UniverseSource for UniverseManifest {
    fn load(&self) -> Result<Vec<KnobUniverses>> {
        Ok(self.knobs.clone())
    }
}

/// JSON universe manifest on disk.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    /// Point at a manifest file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Manifest path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UniverseSource for ManifestFile {
    fn load(&self) -> Result<Vec<KnobUniverses>> {
        let bytes = std::fs::read(&self.path)?;
        let manifest: UniverseManifest = serde_json::from_slice(&bytes)?;
        Ok(manifest.knobs)
    }
}

/// Immutable knob → universe-set catalog.
#[derive(Debug, Clone)]
pub struct UniverseRegistry {
    names: Vec<String>,
    shifts: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
}

impl UniverseRegistry {
    /// Build a registry, validating the knob list.
    pub fn new(knobs: Vec<KnobUniverses>) -> Result<Self> {
        let mut names = Vec::with_capacity(knobs.len());
        let mut shifts = Vec::with_capacity(knobs.len());
        let mut index = HashMap::with_capacity(knobs.len());

        for (i, knob) in knobs.into_iter().enumerate() {
            if knob.name.is_empty() {
                return Err(Error::Validation(format!("knob {i} has an empty name")));
            }
            if let Some(bad) = knob.shifts.iter().find(|s| !s.is_finite()) {
                return Err(Error::Validation(format!(
                    "knob '{}' has non-finite shift value {bad}",
                    knob.name
                )));
            }
            if index.insert(knob.name.clone(), i).is_some() {
                return Err(Error::Validation(format!("duplicate knob '{}'", knob.name)));
            }
            names.push(knob.name);
            shifts.push(knob.shifts);
        }

        log::info!("universe registry loaded: {} knobs", names.len());
        Ok(Self { names, shifts, index })
    }

    /// Build a registry from any source.
    pub fn from_source(source: &dyn UniverseSource) -> Result<Self> {
        Self::new(source.load()?)
    }

    /// Build a registry from a JSON manifest file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(&ManifestFile::new(path.as_ref()))
    }

    /// Number of knobs.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` when no knobs are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Shift values of every universe of `knob`.
    pub fn shift_values(&self, knob: &str) -> Result<&[f64]> {
        let i = self.syst_index(knob)?;
        Ok(&self.shifts[i])
    }

    /// Number of universes of `knob`.
    pub fn n_universes(&self, knob: &str) -> Result<usize> {
        Ok(self.shift_values(knob)?.len())
    }
}

impl UniverseLookup for UniverseRegistry {
    fn systs(&self) -> &[String] {
        &self.names
    }

    fn syst_index(&self, knob: &str) -> Result<usize> {
        self.index.get(knob).copied().ok_or_else(|| Error::UnknownSystematic(knob.to_string()))
    }

    fn closest_shift_index(
        &self,
        knob: &str,
        shift: f64,
        side: Side,
    ) -> Result<Option<ClosestShift>> {
        let shifts = self.shift_values(knob)?;

        let mut best: Option<ClosestShift> = None;
        let mut best_dist = f64::INFINITY;
        for (index, &s) in shifts.iter().enumerate() {
            match side {
                Side::Below if s > shift => continue,
                Side::Above if s < shift => continue,
                _ => {}
            }
            // Strict comparison keeps the lowest index on ties.
            let dist = (s - shift).abs();
            if best.is_none() || dist < best_dist {
                best = Some(ClosestShift { index, shift: s });
                best_dist = dist;
            }
        }
        Ok(best)
    }
}

static GLOBAL: OnceLock<Arc<UniverseRegistry>> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = Mutex::new(());

/// Install the process-wide registry, building it from `source` exactly once.
///
/// Later calls return the already-installed registry and do not touch `source`.
pub fn install_global(source: &dyn UniverseSource) -> Result<Arc<UniverseRegistry>> {
    if let Some(reg) = GLOBAL.get() {
        return Ok(Arc::clone(reg));
    }

    let _guard = GLOBAL_INIT
        .lock()
        .map_err(|_| Error::Computation("universe registry init lock poisoned".into()))?;
    if let Some(reg) = GLOBAL.get() {
        return Ok(Arc::clone(reg));
    }

    let reg = Arc::new(UniverseRegistry::from_source(source)?);
    // Only this thread can reach `set` while holding the init lock.
    let _ = GLOBAL.set(Arc::clone(&reg));
    Ok(reg)
}

/// The process-wide registry, if [`install_global`] has run.
pub fn global() -> Result<Arc<UniverseRegistry>> {
    GLOBAL
        .get()
        .cloned()
        .ok_or_else(|| Error::Validation("universe registry has not been installed".into()))
}
