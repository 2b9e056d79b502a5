//! Two-flavour short-baseline oscillation probabilities.
//!
//! `P(να → νβ) = sin²2θ · sin²(1.267 · Δm² · L / E)` with Δm² in eV², L in km
//! and E in GeV.

use serde::{Deserialize, Serialize};

/// Phase conversion factor for Δm²[eV²] · L[km] / E[GeV].
pub const PHASE_FACTOR: f64 = 1.267;

/// How a sample's signal responds to oscillations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscType {
    /// Signal is not oscillated.
    #[default]
    None,
    /// νμ → νe appearance: signal is weighted by `P`.
    Appearance,
    /// νμ → νμ disappearance: signal is weighted by `1 − P`.
    Disappearance,
}

impl OscType {
    /// Survival/appearance weight of a signal event at `(l_km, e_gev)`.
    pub fn weight(self, sin2theta: f64, dm2: f64, l_km: f64, e_gev: f64) -> f64 {
        match self {
            OscType::None => 1.0,
            OscType::Appearance => appearance_probability(sin2theta, dm2, l_km, e_gev),
            OscType::Disappearance => 1.0 - appearance_probability(sin2theta, dm2, l_km, e_gev),
        }
    }

    /// Whether the unoscillated signal belongs in the null hypothesis.
    ///
    /// Appearance signal only exists if oscillations happen.
    pub fn signal_in_null(self) -> bool {
        !matches!(self, OscType::Appearance)
    }
}

/// Two-flavour oscillation probability.
///
/// Non-positive energies give zero.
pub fn appearance_probability(sin2theta: f64, dm2: f64, l_km: f64, e_gev: f64) -> f64 {
    if e_gev <= 0.0 {
        return 0.0;
    }
    let s = (PHASE_FACTOR * dm2 * l_km / e_gev).sin();
    sin2theta * s * s
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_first_maximum() {
        // Phase of π/2 at L/E chosen for Δm² = 1 eV².
        let l_over_e = FRAC_PI_2 / PHASE_FACTOR;
        let p = appearance_probability(0.01, 1.0, l_over_e, 1.0);
        assert_relative_eq!(p, 0.01, epsilon = 1e-12);
        assert_relative_eq!(
            OscType::Disappearance.weight(0.01, 1.0, l_over_e, 1.0),
            0.99,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_no_oscillation_limits() {
        assert_eq!(appearance_probability(0.0, 1.0, 0.6, 1.0), 0.0);
        assert_eq!(appearance_probability(0.5, 0.0, 0.6, 1.0), 0.0);
        assert_eq!(appearance_probability(0.5, 1.0, 0.6, 0.0), 0.0);
        assert_eq!(OscType::None.weight(1.0, 1.0, 0.6, 1.0), 1.0);
    }

    #[test]
    fn test_bounded() {
        for i in 0..100 {
            let e = 0.2 + 0.05 * i as f64;
            let p = appearance_probability(0.3, 2.5, 0.11, e);
            assert!((0.0..=0.3).contains(&p));
        }
    }

    #[test]
    fn test_serde_names() {
        let t: OscType = serde_json::from_str("\"disappearance\"").unwrap();
        assert_eq!(t, OscType::Disappearance);
        assert!(!OscType::Appearance.signal_in_null());
        assert!(OscType::None.signal_in_null());
    }
}
