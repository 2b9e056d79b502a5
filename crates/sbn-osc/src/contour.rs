//! Exclusion contours from a chi-square surface.

use serde::{Deserialize, Serialize};

use crate::config::ContourLevel;

/// One contour: for each Δm² row that crosses the level, the sin²2θ at
/// which it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    /// Level label.
    pub label: String,
    /// Chi-square threshold.
    pub chi2: f64,
    /// sin²2θ of each point.
    pub sin2theta: Vec<f64>,
    /// Δm² of each point.
    pub dm2: Vec<f64>,
}

impl Contour {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.dm2.len()
    }

    /// Whether no row crossed the level.
    pub fn is_empty(&self) -> bool {
        self.dm2.is_empty()
    }
}

/// First sin²2θ along one row at which `chi2` reaches `level`.
///
/// Interpolates linearly in log10(sin²2θ). A row already at or above the
/// level at its first point returns that point; a row that never reaches it
/// returns `None`.
pub fn first_crossing(sin2theta: &[f64], chi2: &[f64], level: f64) -> Option<f64> {
    let j = chi2.iter().position(|&c| c >= level)?;
    if j == 0 {
        return sin2theta.first().copied();
    }
    let (c0, c1) = (chi2[j - 1], chi2[j]);
    let (l0, l1) = (sin2theta[j - 1].log10(), sin2theta[j].log10());
    let t = if c1 > c0 { (level - c0) / (c1 - c0) } else { 1.0 };
    Some(10f64.powf(l0 + t * (l1 - l0)))
}

/// Contour of `surface` (indexed `[dm2][sin2theta]`) at `level`.
pub fn extract(
    sin2theta: &[f64],
    dm2: &[f64],
    surface: &[Vec<f64>],
    level: &ContourLevel,
) -> Contour {
    let mut out = Contour {
        label: level.label.clone(),
        chi2: level.chi2,
        sin2theta: Vec::new(),
        dm2: Vec::new(),
    };
    for (&m, row) in dm2.iter().zip(surface) {
        if let Some(s) = first_crossing(sin2theta, row, level.chi2) {
            out.sin2theta.push(s);
            out.dm2.push(m);
        }
    }
    out
}
