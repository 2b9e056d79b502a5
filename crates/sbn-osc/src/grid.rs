//! Log-spaced parameter grids.

/// `n` points spaced evenly in log10 between `10^lims[0]` and `10^lims[1]`.
///
/// Both ends are included.
pub fn log_grid(lims: [f64; 2], n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10f64.powf(lims[0])],
        _ => {
            let step = (lims[1] - lims[0]) / (n - 1) as f64;
            (0..n).map(|i| 10f64.powf(lims[0] + step * i as f64)).collect()
        }
    }
}
