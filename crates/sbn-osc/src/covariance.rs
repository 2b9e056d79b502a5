//! Fractional covariance sources and the absolute covariance used in the fit.
//!
//! Matrices are indexed over the reconstructed-energy bins of all samples,
//! concatenated in configuration order.

use nalgebra::DMatrix;
use sbn_core::{Error, Result};

/// Provider of the fractional covariance matrix.
///
/// `finalize` closes out any accumulation and is called exactly once, as the
/// first sensitivity stage.
pub trait CovarianceSource: Send {
    /// Fractional covariance `F_ij`.
    fn finalize(&mut self) -> Result<DMatrix<f64>>;
}

/// A precomputed fractional covariance.
#[derive(Debug, Clone)]
pub struct FixedCovariance {
    matrix: DMatrix<f64>,
}

impl FixedCovariance {
    /// Wrap a square matrix.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() {
            return Err(Error::Validation(format!(
                "covariance must be square, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(Self { matrix })
    }

    /// Matrix from row vectors.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n) {
            return Err(Error::Validation(format!(
                "covariance row has {} entries, expected {n}",
                bad.len()
            )));
        }
        Self::new(DMatrix::from_fn(n, n, |i, j| rows[i][j]))
    }

    /// No systematic uncertainty: statistics only.
    pub fn zeros(n: usize) -> Self {
        Self { matrix: DMatrix::zeros(n, n) }
    }
}

impl CovarianceSource for FixedCovariance {
    fn finalize(&mut self) -> Result<DMatrix<f64>> {
        Ok(self.matrix.clone())
    }
}

/// Fractional covariance accumulated from systematic universes.
///
/// Each universe is a spectrum over the same concatenated bins as the central
/// value. `F_ij = mean_u[(u_i - c_i)(u_j - c_j)] / (c_i c_j)`; bins with zero
/// central value get zero rows.
#[derive(Debug, Clone, Default)]
pub struct UniverseCovariance {
    central: Vec<f64>,
    universes: Vec<Vec<f64>>,
}

impl UniverseCovariance {
    /// Accumulator around a central-value spectrum.
    pub fn new(central: Vec<f64>) -> Self {
        Self { central, universes: Vec::new() }
    }

    /// Add one universe spectrum.
    pub fn add_universe(&mut self, spectrum: Vec<f64>) -> Result<()> {
        if spectrum.len() != self.central.len() {
            return Err(Error::Validation(format!(
                "universe has {} bins, central value has {}",
                spectrum.len(),
                self.central.len()
            )));
        }
        self.universes.push(spectrum);
        Ok(())
    }

    /// Number of universes accumulated.
    pub fn n_universes(&self) -> usize {
        self.universes.len()
    }
}

impl CovarianceSource for UniverseCovariance {
    fn finalize(&mut self) -> Result<DMatrix<f64>> {
        if self.universes.is_empty() {
            return Err(Error::Computation("no universes accumulated".into()));
        }
        let n = self.central.len();
        let nu = self.universes.len() as f64;
        let mut cov = DMatrix::zeros(n, n);
        for u in &self.universes {
            for i in 0..n {
                let di = u[i] - self.central[i];
                for j in 0..n {
                    cov[(i, j)] += di * (u[j] - self.central[j]) / nu;
                }
            }
        }
        for i in 0..n {
            for j in 0..n {
                let norm = self.central[i] * self.central[j];
                cov[(i, j)] = if norm != 0.0 { cov[(i, j)] / norm } else { 0.0 };
            }
        }
        log::debug!("fractional covariance from {} universes over {n} bins", self.universes.len());
        Ok(cov)
    }
}

/// Absolute covariance `E_ij = F_ij n_i n_j + δ_ij n_i`.
pub fn absolute_covariance(fractional: &DMatrix<f64>, counts: &[f64]) -> Result<DMatrix<f64>> {
    let n = counts.len();
    if fractional.nrows() != n || fractional.ncols() != n {
        return Err(Error::Validation(format!(
            "covariance is {}x{} but samples have {n} bins",
            fractional.nrows(),
            fractional.ncols()
        )));
    }
    let mut e = DMatrix::from_fn(n, n, |i, j| fractional[(i, j)] * counts[i] * counts[j]);
    for (i, &c) in counts.iter().enumerate() {
        e[(i, i)] += c;
    }
    Ok(e)
}

/// Inverse of a covariance matrix.
pub fn invert(matrix: DMatrix<f64>) -> Result<DMatrix<f64>> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(Error::Computation("covariance has non-finite entries".into()));
    }
    let inv = matrix
        .try_inverse()
        .ok_or_else(|| Error::Computation("covariance matrix is singular".into()))?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(Error::Computation("covariance inverse is not finite".into()));
    }
    Ok(inv)
}
