//! Calinski–Harabasz cluster-separation score.

use ndarray::{Array1, Array2, ArrayView2};
use std::collections::HashMap;
use std::hash::Hash;

/// Ratio of between-cluster to within-cluster dispersion, scaled by degrees of
/// freedom.
///
/// Returns `None` when the score is undefined: fewer than two distinct labels,
/// or as many labels as rows.
pub fn calinski_harabasz<L: Copy + Eq + Hash>(x: ArrayView2<'_, f64>, labels: &[L]) -> Option<f64> {
    let (n, d) = x.dim();
    if n != labels.len() || n == 0 {
        return None;
    }

    let mut slot_of: HashMap<L, usize> = HashMap::new();
    let slots: Vec<usize> = labels
        .iter()
        .map(|l| {
            let next = slot_of.len();
            *slot_of.entry(*l).or_insert(next)
        })
        .collect();
    let n_labels = slot_of.len();
    if n_labels < 2 || n_labels >= n {
        return None;
    }

    let overall: Array1<f64> = x.mean_axis(ndarray::Axis(0))?;
    let mut sums = Array2::<f64>::zeros((n_labels, d));
    let mut counts = vec![0usize; n_labels];
    for (row, &s) in x.outer_iter().zip(&slots) {
        let mut acc = sums.row_mut(s);
        acc += &row;
        counts[s] += 1;
    }
    for (mut centroid, &c) in sums.outer_iter_mut().zip(&counts) {
        centroid /= c as f64;
    }

    let between: f64 = sums
        .outer_iter()
        .zip(&counts)
        .map(|(c, &size)| {
            size as f64
                * c.iter()
                    .zip(overall.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
        })
        .sum();
    let within: f64 = x
        .outer_iter()
        .zip(&slots)
        .map(|(row, &s)| {
            row.iter()
                .zip(sums.row(s).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
        })
        .sum();

    if within == 0.0 {
        return Some(1.0);
    }
    Some(between * (n - n_labels) as f64 / (within * (n_labels - 1) as f64))
}

/// Score used for model selection: undefined scores count as 0.
pub fn score_or_zero<L: Copy + Eq + Hash>(x: ArrayView2<'_, f64>, labels: &[L]) -> f64 {
    calinski_harabasz(x, labels)
        .filter(|s| s.is_finite())
        .unwrap_or(0.0)
}
