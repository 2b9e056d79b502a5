//! Common data types for SBN event records

use serde::{Deserialize, Serialize};

use crate::traits::SliceRecord;

/// Weight universes of one knob for one event.
///
/// `univ[i]` is the multiplicative weight this event receives in universe `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Multiverse {
    /// Per-universe weights, in universe order.
    pub univ: Vec<f32>,
}

impl Multiverse {
    /// Create a weight vector from per-universe weights.
    pub fn new(univ: impl Into<Vec<f32>>) -> Self {
        Self { univ: univ.into() }
    }

    /// Number of universes stored for this knob.
    pub fn len(&self) -> usize {
        self.univ.len()
    }

    /// `true` when no universes are stored.
    pub fn is_empty(&self) -> bool {
        self.univ.is_empty()
    }
}

/// Truth block of a reconstructed slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceTruth {
    /// Index of the matched generator-level interaction; negative for none.
    pub index: i64,
    /// Weight universes, indexed by registry knob index.
    #[serde(default)]
    pub wgt: Vec<Multiverse>,
    /// Charged-current interaction.
    #[serde(default)]
    pub iscc: bool,
    /// PDG code of the incoming neutrino.
    #[serde(default)]
    pub pdg: i32,
}

impl Default for SliceTruth {
    fn default() -> Self {
        Self { index: -1, wgt: Vec::new(), iscc: false, pdg: 0 }
    }
}

/// Minimal owned slice record.
///
/// Drivers that hold their own event schema implement [`SliceRecord`]
/// directly; this type covers tests, the CLI and JSON-fed workflows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Slice {
    /// Truth information.
    pub truth: SliceTruth,
}

impl Slice {
    /// A slice with no simulated truth (e.g. real data).
    pub fn data() -> Self {
        Self::default()
    }

    /// A simulated slice with the given truth index and weight payload.
    pub fn simulated(index: i64, wgt: Vec<Multiverse>) -> Self {
        Self { truth: SliceTruth { index, wgt, ..SliceTruth::default() } }
    }

    /// Set the interaction flavour flags.
    pub fn with_interaction(mut self, iscc: bool, pdg: i32) -> Self {
        self.truth.iscc = iscc;
        self.truth.pdg = pdg;
        self
    }
}

impl SliceRecord for Slice {
    fn truth_index(&self) -> i64 {
        self.truth.index
    }

    fn truth_weights(&self) -> &[Multiverse] {
        &self.truth.wgt
    }

    fn truth_is_cc(&self) -> bool {
        self.truth.iscc
    }

    fn truth_pdg(&self) -> i32 {
        self.truth.pdg
    }
}
