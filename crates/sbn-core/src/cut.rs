//! Boolean event-selection predicates over slice records.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use crate::traits::SliceRecord;

type Predicate = dyn Fn(&dyn SliceRecord) -> bool + Send + Sync;

/// A named, cheaply cloneable selection predicate.
///
/// Cuts compose with `&`, `|` and `!`:
///
/// ```
/// use sbn_core::cut::{is_antinu, is_cc};
///
/// let cc_nu = is_cc() & !is_antinu();
/// assert_eq!(cc_nu.name(), "(IsCC && !IsAntiNu)");
/// ```
#[derive(Clone)]
pub struct Cut {
    name: String,
    pred: Arc<Predicate>,
}

impl Cut {
    /// Wrap a predicate.
    pub fn new(
        name: impl Into<String>,
        pred: impl Fn(&dyn SliceRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), pred: Arc::new(pred) }
    }

    /// A cut that accepts every slice.
    pub fn no_cut() -> Self {
        Self::new("NoCut", |_| true)
    }

    /// Human-readable description.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate.
    pub fn pass(&self, sr: &dyn SliceRecord) -> bool {
        (self.pred)(sr)
    }
}

impl fmt::Debug for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cut").field("name", &self.name).finish()
    }
}

impl BitAnd for Cut {
    type Output = Cut;

    fn bitand(self, rhs: Cut) -> Cut {
        let name = format!("({} && {})", self.name, rhs.name);
        Cut::new(name, move |sr| self.pass(sr) && rhs.pass(sr))
    }
}

impl BitOr for Cut {
    type Output = Cut;

    fn bitor(self, rhs: Cut) -> Cut {
        let name = format!("({} || {})", self.name, rhs.name);
        Cut::new(name, move |sr| self.pass(sr) || rhs.pass(sr))
    }
}

impl Not for Cut {
    type Output = Cut;

    fn not(self) -> Cut {
        let name = format!("!{}", self.name);
        Cut::new(name, move |sr| !self.pass(sr))
    }
}

/// Truth-matched charged-current interaction.
pub fn is_cc() -> Cut {
    Cut::new("IsCC", |sr| sr.has_truth() && sr.truth_is_cc())
}

/// Truth-matched neutral-current interaction.
pub fn is_nc() -> Cut {
    Cut::new("IsNC", |sr| sr.has_truth() && !sr.truth_is_cc())
}

/// Truth-matched interaction of an incoming antineutrino.
pub fn is_antinu() -> Cut {
    Cut::new("IsAntiNu", |sr| sr.has_truth() && sr.truth_pdg() < 0)
}
