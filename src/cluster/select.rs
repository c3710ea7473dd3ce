//! Model-order selection by cluster-separation score.

use ndarray::ArrayView2;
use rayon::prelude::*;
use tracing::debug;

use super::Clusterer;
use super::score::score_or_zero;

/// Outcome of choosing a cluster count for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Sub-cluster index per row, `0..n_clusters`.
    pub labels: Vec<usize>,
    /// Winning candidate; `None` when the bucket was too small to fit any.
    pub n_clusters: Option<usize>,
    pub score: f64,
}

/// Fits every candidate count that the bucket can hold and keeps the one with
/// the highest score. Ties go to the smaller count, and candidates whose score
/// is undefined count as 0.
///
/// A bucket smaller than every candidate is returned as a single sub-cluster 0.
pub fn select_model<C: Clusterer + ?Sized>(
    clusterer: &C,
    x: ArrayView2<'_, f64>,
    candidates: &[usize],
) -> Selection {
    let n = x.nrows();
    let mut feasible: Vec<usize> = candidates.iter().copied().filter(|&k| k <= n).collect();
    feasible.sort_unstable();
    feasible.dedup();

    let fitted: Vec<(usize, Vec<usize>, f64)> = feasible
        .par_iter()
        .map(|&k| {
            let labels = clusterer.fit_predict(x, k);
            let score = score_or_zero(x, &labels);
            (k, labels, score)
        })
        .collect();

    let mut best: Option<(usize, Vec<usize>, f64)> = None;
    for (k, labels, score) in fitted {
        debug!(algorithm = clusterer.name(), rows = n, k, score, "candidate fitted");
        if best.as_ref().is_none_or(|b| score > b.2) {
            best = Some((k, labels, score));
        }
    }

    match best {
        Some((k, labels, score)) => Selection {
            labels,
            n_clusters: Some(k),
            score,
        },
        None => Selection {
            labels: vec![0; n],
            n_clusters: None,
            score: 0.0,
        },
    }
}
