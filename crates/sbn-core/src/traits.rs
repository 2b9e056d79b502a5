//! Core traits for SBN reweighting
//!
//! The event schema and the systematics that act on it meet here:
//! weight calculators only ever see an event through [`SliceRecord`],
//! and fit drivers only ever see a systematic through [`Systematic`].

use crate::Result;
use crate::types::Multiverse;

/// Read-only view of the truth block of a reconstructed slice.
pub trait SliceRecord {
    /// Index of the matched truth interaction; negative means no simulated truth.
    fn truth_index(&self) -> i64;

    /// Weight universes, one [`Multiverse`] per registry knob. May be empty.
    fn truth_weights(&self) -> &[Multiverse];

    /// Whether the matched interaction is charged-current.
    fn truth_is_cc(&self) -> bool;

    /// PDG code of the incoming neutrino (negative for antineutrinos).
    fn truth_pdg(&self) -> i32;

    /// Whether the slice is backed by a generator-level truth record.
    fn has_truth(&self) -> bool {
        self.truth_index() >= 0
    }
}

/// A systematic uncertainty that can be dialled continuously.
pub trait Systematic: Send + Sync {
    /// Unique short name.
    fn short_name(&self) -> &str;

    /// Display name (LaTeX allowed).
    fn latex_name(&self) -> &str;

    /// Apply a shift of `sigma` standard deviations to `weight`.
    ///
    /// Events outside the systematic's domain leave `weight` untouched.
    fn shift(&self, sigma: f64, sr: &dyn SliceRecord, weight: &mut f64) -> Result<()>;
}
