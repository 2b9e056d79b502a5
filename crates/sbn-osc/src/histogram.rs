//! Variable-width binned containers used to accumulate sample spectra.
//!
//! Entries outside the axis range are dropped from the bins and recorded in
//! the flow totals.

use sbn_core::{Error, Result};
use serde::{Deserialize, Serialize};

fn validate_edges(axis: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(Error::Validation(format!(
            "{axis}: need at least 2 bin edges, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(Error::Validation(format!("{axis}: bin edges must be finite")));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::Validation(format!("{axis}: bin edges must be strictly increasing")));
    }
    Ok(())
}

/// Bin index of `x`, or `None` outside `[edges[0], edges[n])`.
fn find_bin(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len() - 1;
    if !(x >= edges[0] && x < edges[n]) {
        return None;
    }
    // First edge strictly greater than x, minus one.
    Some(edges.partition_point(|&e| e <= x) - 1)
}

fn centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

/// One-dimensional histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    /// Bin edges (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Sum of weights per bin.
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
    /// Sum of weights dropped outside the axis range.
    pub flow: f64,
    /// Entries that landed in a bin.
    pub entries: u64,
}

impl Hist1D {
    /// Empty histogram with the given edges.
    pub fn new(bin_edges: &[f64]) -> Result<Self> {
        validate_edges("x", bin_edges)?;
        let n = bin_edges.len() - 1;
        Ok(Self {
            bin_edges: bin_edges.to_vec(),
            bin_content: vec![0.0; n],
            sumw2: vec![0.0; n],
            flow: 0.0,
            entries: 0,
        })
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Bin index of `x`.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        find_bin(&self.bin_edges, x)
    }

    /// Bin centres.
    pub fn centers(&self) -> Vec<f64> {
        centers(&self.bin_edges)
    }

    /// Add `w` at `x`. Returns the bin filled, if any.
    pub fn fill(&mut self, x: f64, w: f64) -> Option<usize> {
        match self.find_bin(x) {
            Some(i) => {
                self.bin_content[i] += w;
                self.sumw2[i] += w * w;
                self.entries += 1;
                Some(i)
            }
            None => {
                self.flow += w;
                None
            }
        }
    }

    /// Multiply every bin by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.bin_content {
            *c *= factor;
        }
        for s in &mut self.sumw2 {
            *s *= factor * factor;
        }
        self.flow *= factor;
    }

    /// Multiply bin `i` by `factors[i]`.
    pub fn scale_bins(&mut self, factors: &[f64]) -> Result<()> {
        if factors.len() != self.n_bins() {
            return Err(Error::Validation(format!(
                "per-bin scale has {} entries for {} bins",
                factors.len(),
                self.n_bins()
            )));
        }
        for ((c, s), f) in self.bin_content.iter_mut().zip(&mut self.sumw2).zip(factors) {
            *c *= f;
            *s *= f * f;
        }
        Ok(())
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }
}

/// Three-dimensional histogram, stored x-major (`x` outermost, `z` innermost).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist3D {
    /// Edges of the first axis.
    pub x_edges: Vec<f64>,
    /// Edges of the second axis.
    pub y_edges: Vec<f64>,
    /// Edges of the third axis.
    pub z_edges: Vec<f64>,
    /// Flattened bin contents.
    pub bin_content: Vec<f64>,
    /// Flattened sum of weights squared.
    pub sumw2: Vec<f64>,
    /// Sum of weights dropped outside any axis range.
    pub flow: f64,
}

impl Hist3D {
    /// Empty histogram with the given edges.
    pub fn new(x_edges: &[f64], y_edges: &[f64], z_edges: &[f64]) -> Result<Self> {
        validate_edges("x", x_edges)?;
        validate_edges("y", y_edges)?;
        validate_edges("z", z_edges)?;
        let n = (x_edges.len() - 1) * (y_edges.len() - 1) * (z_edges.len() - 1);
        Ok(Self {
            x_edges: x_edges.to_vec(),
            y_edges: y_edges.to_vec(),
            z_edges: z_edges.to_vec(),
            bin_content: vec![0.0; n],
            sumw2: vec![0.0; n],
            flow: 0.0,
        })
    }

    /// Bins per axis.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.x_edges.len() - 1, self.y_edges.len() - 1, self.z_edges.len() - 1)
    }

    #[inline]
    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        let (_, ny, nz) = self.shape();
        (i * ny + j) * nz + k
    }

    /// Content of bin `(i, j, k)`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.bin_content[self.offset(i, j, k)]
    }

    /// Bin centres of the second axis.
    pub fn y_centers(&self) -> Vec<f64> {
        centers(&self.y_edges)
    }

    /// Bin centres of the third axis.
    pub fn z_centers(&self) -> Vec<f64> {
        centers(&self.z_edges)
    }

    /// Add `w` at `(x, y, z)`. Returns `false` if the point is outside the axes.
    pub fn fill(&mut self, x: f64, y: f64, z: f64, w: f64) -> bool {
        let bins = (
            find_bin(&self.x_edges, x),
            find_bin(&self.y_edges, y),
            find_bin(&self.z_edges, z),
        );
        match bins {
            (Some(i), Some(j), Some(k)) => {
                let o = self.offset(i, j, k);
                self.bin_content[o] += w;
                self.sumw2[o] += w * w;
                true
            }
            _ => {
                self.flow += w;
                false
            }
        }
    }

    /// Multiply every bin by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.bin_content {
            *c *= factor;
        }
        for s in &mut self.sumw2 {
            *s *= factor * factor;
        }
        self.flow *= factor;
    }

    /// Multiply every bin in x-slice `i` by `factors[i]`.
    pub fn scale_x_bins(&mut self, factors: &[f64]) -> Result<()> {
        let (nx, ny, nz) = self.shape();
        if factors.len() != nx {
            return Err(Error::Validation(format!(
                "per-bin scale has {} entries for {nx} bins",
                factors.len()
            )));
        }
        let stride = ny * nz;
        for (i, f) in factors.iter().enumerate() {
            for o in i * stride..(i + 1) * stride {
                self.bin_content[o] *= f;
                self.sumw2[o] *= f * f;
            }
        }
        Ok(())
    }

    /// Sum over the second and third axes.
    pub fn project_x(&self) -> Vec<f64> {
        let (_, ny, nz) = self.shape();
        self.bin_content.chunks(ny * nz).map(|c| c.iter().sum()).collect()
    }
}
