//! Lloyd's K-means with greedy k-means++ seeding and restarts.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Clusterer;
use crate::config::ClusteringConfig;

#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

/// Result of one K-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centers: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned center.
    pub inertia: f64,
    pub n_iter: usize,
}

fn sq_dist(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index drawn with probability proportional to `weights`.
fn weighted_pick(weights: &[f64], total: f64, rng: &mut StdRng) -> usize {
    let mut target = rng.random::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        target -= w;
        if target < 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

impl KMeans {
    pub fn from_config(cfg: &ClusteringConfig) -> Self {
        Self {
            n_init: cfg.n_init.max(1),
            max_iter: cfg.max_iter.max(1),
            tol: cfg.tol,
            seed: cfg.random_state,
        }
    }

    /// Fits `k` centers to the rows of `x`; keeps the lowest-inertia restart.
    ///
    /// `k` is clamped to the number of rows.
    pub fn fit(&self, x: ArrayView2<'_, f64>, k: usize) -> KMeansFit {
        let n = x.nrows();
        let k = k.clamp(1, n.max(1));
        if n == 0 {
            return KMeansFit {
                centers: Array2::zeros((0, x.ncols())),
                labels: Vec::new(),
                inertia: 0.0,
                n_iter: 0,
            };
        }

        let tol = self.tol * mean_column_variance(x);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;
        for _ in 0..self.n_init {
            let centers = init_plus_plus(x, k, &mut rng);
            let fit = self.lloyd(x, centers, tol);
            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.unwrap_or_else(|| self.lloyd(x, init_plus_plus(x, k, &mut rng), tol))
    }

    fn lloyd(&self, x: ArrayView2<'_, f64>, mut centers: Array2<f64>, tol: f64) -> KMeansFit {
        let k = centers.nrows();
        let mut labels = vec![0usize; x.nrows()];
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let distances = assign(x, centers.view(), &mut labels);

            let mut next = Array2::<f64>::zeros(centers.raw_dim());
            let mut counts = vec![0usize; k];
            for (row, &l) in x.outer_iter().zip(&labels) {
                let mut acc = next.row_mut(l);
                acc += &row;
                counts[l] += 1;
            }

            // Empty clusters take over the points worst served by their center.
            let mut far: Vec<usize> = (0..x.nrows()).collect();
            far.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
            let mut far = far.into_iter();
            for c in 0..k {
                if counts[c] == 0 {
                    if let Some(p) = far.next() {
                        next.row_mut(c).assign(&x.row(p));
                        counts[c] = 1;
                    }
                } else {
                    let mut center = next.row_mut(c);
                    center /= counts[c] as f64;
                }
            }

            let shift: f64 = centers
                .outer_iter()
                .zip(next.outer_iter())
                .map(|(a, b)| sq_dist(a, b))
                .sum();
            centers = next;
            if shift <= tol {
                break;
            }
        }

        let distances = assign(x, centers.view(), &mut labels);
        KMeansFit {
            centers,
            labels,
            inertia: distances.iter().sum(),
            n_iter,
        }
    }
}

impl Clusterer for KMeans {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn fit_predict(&self, x: ArrayView2<'_, f64>, k: usize) -> Vec<usize> {
        self.fit(x, k).labels
    }
}

/// Nearest-center assignment; returns each row's squared distance to its center.
fn assign(x: ArrayView2<'_, f64>, centers: ArrayView2<'_, f64>, labels: &mut [usize]) -> Vec<f64> {
    x.outer_iter()
        .zip(labels.iter_mut())
        .map(|(row, label)| {
            let (best, dist) = centers
                .outer_iter()
                .enumerate()
                .map(|(c, center)| (c, sq_dist(row, center)))
                .fold((0, f64::INFINITY), |acc, cur| if cur.1 < acc.1 { cur } else { acc });
            *label = best;
            dist
        })
        .collect()
}

fn mean_column_variance(x: ArrayView2<'_, f64>) -> f64 {
    if x.ncols() == 0 {
        return 0.0;
    }
    x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// Greedy k-means++: each new center is the best of a few candidates sampled
/// proportionally to their squared distance from the chosen centers.
fn init_plus_plus(x: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let mut centers = Array2::<f64>::zeros((k, x.ncols()));
    let first = rng.random_range(0..n);
    centers.row_mut(0).assign(&x.row(first));

    let mut closest: Vec<f64> = x.outer_iter().map(|r| sq_dist(r, x.row(first))).collect();
    let n_trials = 2 + (k as f64).ln().floor() as usize;

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for _ in 0..n_trials {
            let candidate = if total > 0.0 {
                weighted_pick(&closest, total, rng)
            } else {
                rng.random_range(0..n)
            };
            let updated: Vec<f64> = x
                .outer_iter()
                .zip(&closest)
                .map(|(r, &d)| d.min(sq_dist(r, x.row(candidate))))
                .collect();
            let potential: f64 = updated.iter().sum();
            if best.as_ref().is_none_or(|b| potential < b.1) {
                best = Some((candidate, potential, updated));
            }
        }
        if let Some((candidate, _, updated)) = best {
            centers.row_mut(c).assign(&x.row(candidate));
            closest = updated;
        }
    }
    centers
}
