//! Column-wise feature scaling.
//!
//! Both views keep the source column order so weight vectors built against the
//! feature schema line up with either of them.

use ndarray::{Array2, ArrayView2, Axis};

use crate::features::FeatureTable;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation given a pre-computed mean.
/// Returns 0.0 for fewer than two values.
pub fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// `(x - mean) / std` per column; zero-variance columns become all 0.
pub fn standardize(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = Array2::zeros(x.raw_dim());
    for (src, mut dst) in x.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
        let col = src.to_vec();
        let m = mean(&col);
        let sd = sample_std(&col, m);
        if sd == 0.0 || !sd.is_finite() {
            continue;
        }
        dst.iter_mut()
            .zip(&col)
            .for_each(|(d, v)| *d = (v - m) / sd);
    }
    out
}

/// `(x - min) / (max - min)` per column; zero-range columns become all 0.
pub fn min_max(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = Array2::zeros(x.raw_dim());
    for (src, mut dst) in x.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
        let lo = src.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = src.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = hi - lo;
        if range == 0.0 || !range.is_finite() {
            continue;
        }
        dst.iter_mut()
            .zip(src.iter())
            .for_each(|(d, v)| *d = (v - lo) / range);
    }
    out
}

/// The two scaled views of a feature table used by the clustering algorithms.
#[derive(Debug, Clone)]
pub struct NormalizedViews {
    /// Z-scores, clustered with K-means.
    pub standardized: Array2<f64>,
    /// Min-max scaled, non-negative, clustered with LDA.
    pub min_max: Array2<f64>,
}

impl NormalizedViews {
    pub fn from_table(table: &FeatureTable) -> Self {
        Self {
            standardized: standardize(table.values()),
            min_max: min_max(table.values()),
        }
    }
}
