//! Latent Dirichlet Allocation fitted with batch variational Bayes.
//!
//! Rows are treated as documents and (non-negative) feature values as word
//! counts. The hard label of a row is its most probable topic.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma};
use rayon::prelude::*;

use super::Clusterer;
use crate::config::ClusteringConfig;

const EPS: f64 = f64::EPSILON;
const GAMMA_SHAPE: f64 = 100.0;
const GAMMA_SCALE: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Lda {
    pub max_iter: usize,
    pub max_doc_update_iter: usize,
    pub mean_change_tol: f64,
    pub seed: u64,
}

/// Digamma via recurrence up to x >= 6 followed by the asymptotic series.
pub fn digamma(mut x: f64) -> f64 {
    if x <= 0.0 && x.fract() == 0.0 {
        return f64::NAN;
    }
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2
            * (1.0 / 12.0
                - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))))
}

/// `exp(E[log p])` of a Dirichlet with parameters `alpha`.
fn exp_dirichlet_expectation(alpha: &[f64]) -> Vec<f64> {
    let psi_sum = digamma(alpha.iter().sum());
    alpha.iter().map(|a| (digamma(*a) - psi_sum).exp()).collect()
}

fn exp_dirichlet_expectation_rows(alpha: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(alpha.raw_dim());
    for (src, mut dst) in alpha.outer_iter().zip(out.outer_iter_mut()) {
        dst.assign(&Array1::from(exp_dirichlet_expectation(&src.to_vec())));
    }
    out
}

/// Sparse view of one document.
struct Doc {
    ids: Vec<usize>,
    counts: Vec<f64>,
}

fn documents(x: ArrayView2<'_, f64>) -> Vec<Doc> {
    x.outer_iter()
        .map(|row| {
            let (ids, counts) = row
                .iter()
                .enumerate()
                .filter(|(_, v)| **v > 0.0)
                .map(|(i, v)| (i, *v))
                .unzip();
            Doc { ids, counts }
        })
        .collect()
}

struct DocUpdate {
    gamma: Vec<f64>,
    /// Sufficient-statistics contribution over `ids`, topic-major.
    sstats: Option<Vec<f64>>,
}

impl Lda {
    pub fn from_config(cfg: &ClusteringConfig) -> Self {
        Self {
            max_iter: cfg.lda_max_iter.max(1),
            max_doc_update_iter: cfg.lda_max_doc_update_iter.max(1),
            mean_change_tol: cfg.lda_mean_change_tol,
            seed: cfg.random_state,
        }
    }

    /// Fits `k` topics and returns the normalized document-topic distribution.
    pub fn fit_transform(&self, x: ArrayView2<'_, f64>, k: usize) -> Array2<f64> {
        let k = k.max(1);
        let (n, vocab) = x.dim();
        let prior = 1.0 / k as f64;
        let docs = documents(x);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let gamma_init = Gamma::new(GAMMA_SHAPE, GAMMA_SCALE).ok();
        let mut draw = |rows: usize, cols: usize| -> Array2<f64> {
            Array2::from_shape_fn((rows, cols), |_| match &gamma_init {
                Some(g) => g.sample(&mut rng),
                None => 1.0,
            })
        };

        let mut components = draw(k, vocab);
        let mut exp_topic_word = exp_dirichlet_expectation_rows(&components);

        for _ in 0..self.max_iter {
            let init = draw(n, k);
            let updates = self.e_step(&docs, &exp_topic_word, prior, Some(&init), true);

            let mut sstats = Array2::<f64>::zeros((k, vocab));
            for (doc, update) in docs.iter().zip(&updates) {
                if let Some(s) = &update.sstats {
                    for t in 0..k {
                        for (j, &id) in doc.ids.iter().enumerate() {
                            sstats[[t, id]] += s[t * doc.ids.len() + j];
                        }
                    }
                }
            }
            components = (sstats * &exp_topic_word).mapv(|v| v + prior);
            exp_topic_word = exp_dirichlet_expectation_rows(&components);
        }

        let updates = self.e_step(&docs, &exp_topic_word, prior, None, false);
        let mut out = Array2::<f64>::zeros((n, k));
        for (mut row, update) in out.outer_iter_mut().zip(updates) {
            let total: f64 = update.gamma.iter().sum();
            for (dst, g) in row.iter_mut().zip(&update.gamma) {
                *dst = if total > 0.0 { g / total } else { 0.0 };
            }
        }
        out
    }

    fn e_step(
        &self,
        docs: &[Doc],
        exp_topic_word: &Array2<f64>,
        prior: f64,
        init: Option<&Array2<f64>>,
        with_sstats: bool,
    ) -> Vec<DocUpdate> {
        let k = exp_topic_word.nrows();
        docs.par_iter()
            .enumerate()
            .map(|(d, doc)| {
                let gamma: Vec<f64> = match init {
                    Some(init) => init.row(d).to_vec(),
                    None => vec![1.0; k],
                };
                self.update_document(doc, gamma, exp_topic_word, prior, with_sstats)
            })
            .collect()
    }

    fn update_document(
        &self,
        doc: &Doc,
        mut gamma: Vec<f64>,
        exp_topic_word: &Array2<f64>,
        prior: f64,
        with_sstats: bool,
    ) -> DocUpdate {
        let k = gamma.len();
        let m = doc.ids.len();
        let word = |t: usize, j: usize| exp_topic_word[[t, doc.ids[j]]];
        let norm_phi = |exp_doc: &[f64]| -> Vec<f64> {
            (0..m)
                .map(|j| (0..k).map(|t| exp_doc[t] * word(t, j)).sum::<f64>() + EPS)
                .collect()
        };

        let mut exp_doc = exp_dirichlet_expectation(&gamma);
        for _ in 0..self.max_doc_update_iter {
            let last = gamma.clone();
            let phi = norm_phi(&exp_doc);
            for t in 0..k {
                let dot: f64 = (0..m).map(|j| doc.counts[j] / phi[j] * word(t, j)).sum();
                gamma[t] = exp_doc[t] * dot + prior;
            }
            exp_doc = exp_dirichlet_expectation(&gamma);
            let change =
                gamma.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum::<f64>() / k as f64;
            if change < self.mean_change_tol {
                break;
            }
        }

        let sstats = with_sstats.then(|| {
            let phi = norm_phi(&exp_doc);
            let mut s = vec![0.0; k * m];
            for t in 0..k {
                for j in 0..m {
                    s[t * m + j] = exp_doc[t] * doc.counts[j] / phi[j];
                }
            }
            s
        });
        DocUpdate { gamma, sstats }
    }
}

impl Clusterer for Lda {
    fn name(&self) -> &'static str {
        "lda"
    }

    fn fit_predict(&self, x: ArrayView2<'_, f64>, k: usize) -> Vec<usize> {
        let proba = self.fit_transform(x, k);
        proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
                    .0
            })
            .collect()
    }
}
