//! Clustering algorithms and model selection.

mod kmeans;
mod lda;
mod score;
mod select;

use ndarray::ArrayView2;

pub use kmeans::{KMeans, KMeansFit};
pub use lda::{Lda, digamma};
pub use score::{calinski_harabasz, score_or_zero};
pub use select::{Selection, select_model};

use crate::config::ClusteringConfig;
use crate::params::Algorithm;

/// A hard clustering of matrix rows into at most `k` groups labelled `0..k`.
pub trait Clusterer: Sync {
    fn name(&self) -> &'static str;
    fn fit_predict(&self, x: ArrayView2<'_, f64>, k: usize) -> Vec<usize>;
}

/// Builds the configured clusterer for an algorithm.
pub fn clusterer_for(algorithm: Algorithm, cfg: &ClusteringConfig) -> Box<dyn Clusterer> {
    match algorithm {
        Algorithm::KMeans => Box::new(KMeans::from_config(cfg)),
        Algorithm::Lda => Box::new(Lda::from_config(cfg)),
    }
}
