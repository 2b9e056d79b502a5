//! Per-event weight of a single multi-systematic universe.

use std::sync::{Arc, OnceLock};

use sbn_core::{Error, Result, SliceRecord, Systematic};

use crate::nonres::NonResKnob;
use crate::registry::UniverseLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedKnob {
    syst_idx: usize,
    offset: usize,
}

/// Combined weight of several systematics in one universe.
///
/// For universe `u` the weight of an event is the product over systematics of
/// `wgt[idx].univ[(u + offset) % n_univ]`. Knobs with fewer universes than
/// `u` wrap around.
///
/// Known limitation: systematics with equal universe counts wrap onto the same
/// universe sequence and are therefore correlated across wrapped universes.
pub struct UniverseWeight {
    names: Vec<String>,
    knobs: Vec<DecodedKnob>,
    univ_idx: usize,
    lookup: Arc<dyn UniverseLookup>,
    resolved: OnceLock<Vec<ResolvedKnob>>,
}

/// Registry knob and universe offset a systematic name reads.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecodedKnob {
    knob: String,
    offset: usize,
}

impl DecodedKnob {
    fn decode(name: &str) -> Result<Self> {
        if NonResKnob::is_family(name) {
            let knob = NonResKnob::parse(name)?;
            Ok(Self { knob: knob.backing_knob(), offset: knob.offset() })
        } else {
            Ok(Self { knob: name.to_string(), offset: 0 })
        }
    }
}

impl UniverseWeight {
    /// Weight of universe `univ_idx` over the named systematics.
    ///
    /// Correlated-family names are decoded here and fail with
    /// [`Error::MalformedKnob`]. Registry indices are looked up on the first
    /// simulated event.
    pub fn new<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        univ_idx: usize,
        lookup: Arc<dyn UniverseLookup>,
    ) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let knobs = names.iter().map(|n| DecodedKnob::decode(n)).collect::<Result<Vec<_>>>()?;
        Ok(Self { names, knobs, univ_idx, lookup, resolved: OnceLock::new() })
    }

    /// Weight of universe `univ_idx` over the given systematics' short names.
    pub fn from_systs<'a, S, I>(
        systs: I,
        univ_idx: usize,
        lookup: Arc<dyn UniverseLookup>,
    ) -> Result<Self>
    where
        S: Systematic + ?Sized + 'a,
        I: IntoIterator<Item = &'a Arc<S>>,
    {
        Self::new(systs.into_iter().map(|s| s.short_name().to_string()), univ_idx, lookup)
    }

    /// Systematic names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Target universe index.
    pub fn universe(&self) -> usize {
        self.univ_idx
    }

    /// Event weight; `1.0` for slices without truth or without weight payload.
    pub fn weight(&self, sr: &dyn SliceRecord) -> Result<f64> {
        if !sr.has_truth() {
            return Ok(1.0);
        }

        let resolved = self.resolved()?;

        let wgts = sr.truth_weights();
        if wgts.is_empty() {
            return Ok(1.0);
        }

        let mut w = 1.0;
        for (name, knob) in self.names.iter().zip(resolved) {
            let univs = wgts.get(knob.syst_idx).ok_or_else(|| {
                Error::Validation(format!(
                    "'{name}': knob index {} outside weight payload of {} knobs",
                    knob.syst_idx,
                    wgts.len()
                ))
            })?;
            if univs.is_empty() {
                return Err(Error::Validation(format!("'{name}': knob has no universes")));
            }

            let unividx = (self.univ_idx + knob.offset) % univs.len();
            w *= f64::from(univs.univ[unividx]);
        }

        Ok(w)
    }

    fn resolved(&self) -> Result<&[ResolvedKnob]> {
        if let Some(r) = self.resolved.get() {
            return Ok(r);
        }
        let r = self.resolve()?;
        // Racing threads compute identical results; whichever publishes first wins.
        let _ = self.resolved.set(r);
        Ok(self.resolved.get().map(Vec::as_slice).unwrap_or_default())
    }

    fn resolve(&self) -> Result<Vec<ResolvedKnob>> {
        self.knobs
            .iter()
            .map(|k| {
                Ok(ResolvedKnob { syst_idx: self.lookup.syst_index(&k.knob)?, offset: k.offset })
            })
            .collect()
    }
}

impl std::fmt::Debug for UniverseWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniverseWeight")
            .field("names", &self.names)
            .field("univ_idx", &self.univ_idx)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{KnobUniverses, UniverseRegistry};
    use approx::assert_relative_eq;
    use sbn_core::{Multiverse, Slice};

    fn registry() -> Arc<dyn UniverseLookup> {
        Arc::new(
            UniverseRegistry::new(vec![
                KnobUniverses::new("QEMA", vec![0.0; 100]),
                KnobUniverses::new("NC", vec![0.0; 50]),
                KnobUniverses::new("NonResRvp1pi", vec![0.0; 4]),
                KnobUniverses::new("NonResRvbarp1pi", vec![0.0; 4]),
            ])
            .unwrap(),
        )
    }

    fn ramp(n: usize, scale: f32) -> Multiverse {
        Multiverse::new((0..n).map(|i| 1.0 + scale * i as f32).collect::<Vec<_>>())
    }

    fn slice() -> Slice {
        Slice::simulated(
            0,
            vec![ramp(100, 0.01), ramp(50, 0.001), ramp(4, 0.1), ramp(4, 0.2)],
        )
    }

    #[test]
    fn test_wraparound() {
        let uw = UniverseWeight::new(["QEMA", "NC"], 120, registry()).unwrap();
        let w = uw.weight(&slice()).unwrap();
        // QEMA: 120 % 100 = 20, NC: 120 % 50 = 20
        let expected = f64::from(1.0f32 + 0.01 * 20.0) * f64::from(1.0f32 + 0.001 * 20.0);
        assert_relative_eq!(w, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_nonres_offsets() {
        let sr = slice();
        // vn → vbarp knob (index 3), offset 0
        let uw = UniverseWeight::new(["NonResRvn1piCC"], 1, registry()).unwrap();
        let w = uw.weight(&sr).unwrap();
        assert_relative_eq!(w, f64::from(1.0f32 + 0.2 * 1.0), epsilon = 1e-12);
        // vbarn → vp knob (index 2), offset 3: (2 + 3) % 4 = 1
        let uw = UniverseWeight::new(["NonResRvbarn1piNC"], 2, registry()).unwrap();
        let w = uw.weight(&sr).unwrap();
        assert_relative_eq!(w, f64::from(1.0f32 + 0.1 * 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_identity_without_truth_or_weights() {
        let uw = UniverseWeight::new(["QEMA"], 3, registry()).unwrap();
        assert_eq!(uw.weight(&Slice::data()).unwrap(), 1.0);
        assert_eq!(uw.weight(&Slice::simulated(2, vec![])).unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_name_fails_on_simulated_slice() {
        let uw = UniverseWeight::new(["NotAKnob"], 0, registry()).unwrap();
        // Data slices never reach registry lookup.
        assert_eq!(uw.weight(&Slice::data()).unwrap(), 1.0);
        assert!(matches!(uw.weight(&slice()), Err(Error::UnknownSystematic(_))));
    }

    #[test]
    fn test_malformed_family_name_fails_at_construction() {
        for bad in ["NonResRvp1piXX", "NonResRvx1piCC", "NonResRvp3piNC"] {
            let r = UniverseWeight::new(["QEMA", bad], 0, registry());
            assert!(matches!(r, Err(Error::MalformedKnob(_))), "{bad} accepted");
        }
    }

    #[test]
    fn test_short_payload_is_an_error() {
        let uw = UniverseWeight::new(["NC"], 0, registry()).unwrap();
        let sr = Slice::simulated(0, vec![ramp(100, 0.01)]);
        assert!(matches!(uw.weight(&sr), Err(Error::Validation(_))));
    }

    #[test]
    fn test_empty_syst_list_is_neutral() {
        let uw = UniverseWeight::new(Vec::<String>::new(), 7, registry()).unwrap();
        assert_eq!(uw.weight(&slice()).unwrap(), 1.0);
    }
}
