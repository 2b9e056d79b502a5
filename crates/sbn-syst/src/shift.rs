//! Continuous shifts of a single universe-backed knob.
//!
//! A shift of `x` sigma is realised by linear interpolation between the two
//! universes whose generated shift values bracket `x`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use sbn_core::{Cut, Error, Result, SliceRecord, Systematic};

use crate::registry::{Side, UniverseLookup};

/// Interpolation record for one shift value.
///
/// The event weight is `w0 * univ[i0] + w1 * univ[i1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Univs {
    /// Lower universe index.
    pub i0: usize,
    /// Upper universe index.
    pub i1: usize,
    /// Weight of the lower universe.
    pub w0: f64,
    /// Weight of the upper universe.
    pub w1: f64,
}

impl Univs {
    /// Interpolate between the weights of the two universes.
    pub fn apply(&self, y0: f64, y1: f64) -> f64 {
        self.w0 * y0 + self.w1 * y1
    }
}

/// Memoised [`Univs`] per exact shift value.
///
/// Entries are never invalidated: universe shift values are fixed for the
/// lifetime of the registry.
#[derive(Debug, Default)]
pub struct UnivsCache {
    entries: RwLock<HashMap<u64, Univs>>,
}

impl UnivsCache {
    fn key(x: f64) -> u64 {
        // -0.0 and 0.0 are the same shift.
        if x == 0.0 { 0.0f64.to_bits() } else { x.to_bits() }
    }

    /// Cached record for `x`, if any.
    pub fn get(&self, x: f64) -> Option<Univs> {
        self.entries.read().ok()?.get(&Self::key(x)).copied()
    }

    /// Store the record for `x`. An existing entry is kept.
    pub fn insert(&self, x: f64, u: Univs) -> Univs {
        match self.entries.write() {
            Ok(mut map) => *map.entry(Self::key(x)).or_insert(u),
            Err(_) => u,
        }
    }

    /// Number of cached shift values.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// `true` when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Systematic backed by a knob's weight universes.
pub struct WeightSyst {
    short_name: String,
    latex_name: String,
    knob_name: String,
    cut: Cut,
    lookup: Arc<dyn UniverseLookup>,
    syst_idx: OnceLock<usize>,
    univs: UnivsCache,
}

impl WeightSyst {
    /// Systematic named `syst_name`, using the knob of the same name and no cut.
    pub fn new(syst_name: impl Into<String>, lookup: Arc<dyn UniverseLookup>) -> Self {
        let name = syst_name.into();
        Self::with_knob(name.clone(), name, Cut::no_cut(), lookup)
    }

    /// Systematic named `syst_name` reading universes of `knob_name`, restricted to `cut`.
    ///
    /// An empty `knob_name` means the knob is named like the systematic.
    pub fn with_knob(
        syst_name: impl Into<String>,
        knob_name: impl Into<String>,
        cut: Cut,
        lookup: Arc<dyn UniverseLookup>,
    ) -> Self {
        let short_name = syst_name.into();
        let knob_name = knob_name.into();
        let knob_name = if knob_name.is_empty() { short_name.clone() } else { knob_name };
        Self {
            latex_name: short_name.clone(),
            short_name,
            knob_name,
            cut,
            lookup,
            syst_idx: OnceLock::new(),
            univs: UnivsCache::default(),
        }
    }

    /// Override the display name.
    pub fn latex(mut self, latex_name: impl Into<String>) -> Self {
        self.latex_name = latex_name.into();
        self
    }

    /// Knob whose universes back this systematic.
    pub fn knob_name(&self) -> &str {
        &self.knob_name
    }

    /// Phase-space restriction.
    pub fn cut(&self) -> &Cut {
        &self.cut
    }

    /// Interpolation cache.
    pub fn cache(&self) -> &UnivsCache {
        &self.univs
    }

    fn syst_idx(&self) -> Result<usize> {
        if let Some(&i) = self.syst_idx.get() {
            return Ok(i);
        }
        let i = self.lookup.syst_index(&self.knob_name)?;
        let _ = self.syst_idx.set(i);
        Ok(i)
    }

    /// Bracketing universes and interpolation weights for a shift of `x` sigma.
    pub fn univs(&self, x: f64) -> Result<Univs> {
        if !x.is_finite() {
            return Err(Error::Validation(format!("{}: non-finite shift {x}", self.short_name)));
        }
        if let Some(u) = self.univs.get(x) {
            return Ok(u);
        }

        let below = self.lookup.closest_shift_index(&self.knob_name, x, Side::Below)?;
        let above = self.lookup.closest_shift_index(&self.knob_name, x, Side::Above)?;

        let u = match (below, above) {
            (Some(lo), Some(hi)) if hi.shift == lo.shift => {
                // Exactly on a universe.
                Univs { i0: lo.index, i1: hi.index, w0: 1.0, w1: 0.0 }
            }
            (Some(lo), Some(hi)) => {
                let (x0, x1) = (lo.shift, hi.shift);
                Univs {
                    i0: lo.index,
                    i1: hi.index,
                    w0: (x1 - x) / (x1 - x0),
                    w1: (x - x0) / (x1 - x0),
                }
            }
            // One side missing: blend the universe we did find with itself.
            (Some(only), None) | (None, Some(only)) => {
                log::warn!(
                    "{}: no universe on one side of {x} sigma, using universe {} only",
                    self.knob_name,
                    only.index
                );
                Univs { i0: only.index, i1: only.index, w0: 0.5, w1: 0.5 }
            }
            (None, None) => {
                return Err(Error::Computation(format!(
                    "knob '{}' has no universes",
                    self.knob_name
                )));
            }
        };

        log::debug!(
            "{} {x} sigma, found indices {} and {}, will use weights {} and {}",
            self.knob_name,
            u.i0,
            u.i1,
            u.w0,
            u.w1
        );

        Ok(self.univs.insert(x, u))
    }
}

impl Systematic for WeightSyst {
    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn latex_name(&self) -> &str {
        &self.latex_name
    }

    fn shift(&self, sigma: f64, sr: &dyn SliceRecord, weight: &mut f64) -> Result<()> {
        if !sr.has_truth() {
            return Ok(());
        }
        if !self.cut.pass(sr) {
            return Ok(());
        }

        let idx = self.syst_idx()?;

        let wgts = sr.truth_weights();
        if wgts.is_empty() {
            return Ok(());
        }

        let u = self.univs(sigma)?;

        let univs = wgts.get(idx).ok_or_else(|| {
            Error::Validation(format!(
                "{}: knob index {idx} outside weight payload of {} knobs",
                self.knob_name,
                wgts.len()
            ))
        })?;
        let at = |i: usize| {
            univs.univ.get(i).map(|&y| f64::from(y)).ok_or_else(|| {
                Error::Validation(format!(
                    "{}: universe {i} outside {} stored universes",
                    self.knob_name,
                    univs.len()
                ))
            })
        };

        *weight *= u.apply(at(u.i0)?, at(u.i1)?);
        Ok(())
    }
}

impl std::fmt::Debug for WeightSyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightSyst")
            .field("short_name", &self.short_name)
            .field("knob_name", &self.knob_name)
            .field("cut", &self.cut)
            .field("cached_shifts", &self.univs.len())
            .finish()
    }
}
