//! Segmentation Engine.
//!
//! Phase 1 assigns every rider an initial cluster: its frequency tier, or in
//! hierarchical mode the tier re-split with K-means on purchasing and
//! weekday/weekend features. Phase 2 re-clusters each initial bucket twice,
//! with K-means on standardized features and LDA on min-max features. Ids are
//! built as `bucket * 10 + sub-cluster`.

mod assignment;
mod weights;

pub use assignment::{ClusterAssignment, ClusterScores, ClusterTable};
pub use weights::{FeatureWeights, WeightedColumns};

use ndarray::ArrayView2;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::cluster::{Clusterer, KMeans, clusterer_for, score_or_zero, select_model};
use crate::config::ClusteringConfig;
use crate::features::FeatureTable;
use crate::normalize::NormalizedViews;
use crate::params::Algorithm;

/// Candidate sub-cluster counts for the hierarchical pre-split.
pub const INITIAL_CANDIDATES: [usize; 2] = [2, 3];

/// Candidate sub-cluster counts for the final phase.
pub fn final_candidates(hierarchical: bool) -> Vec<usize> {
    if hierarchical {
        vec![2, 3, 4]
    } else {
        (2..=8).collect()
    }
}

/// Result of one segmentation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub table: ClusterTable,
    pub scores: ClusterScores,
}

pub struct Segmenter<'a> {
    cfg: &'a ClusteringConfig,
}

/// Row indices grouped by bucket id, buckets ascending.
fn buckets(ids: &[u32]) -> BTreeMap<u32, Vec<usize>> {
    let mut out: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (row, id) in ids.iter().enumerate() {
        out.entry(*id).or_default().push(row);
    }
    out
}

/// Re-clusters every bucket independently and returns `bucket * 10 + sub`.
fn split_buckets(
    clusterer: &dyn Clusterer,
    x: ArrayView2<'_, f64>,
    phase: &WeightedColumns,
    ids: &[u32],
    candidates: &[usize],
) -> Vec<u32> {
    let mut out = vec![0u32; ids.len()];
    for (bucket, rows) in buckets(ids) {
        let subset = phase.apply(x, &rows);
        let selection = select_model(clusterer, subset.view(), candidates);
        debug!(
            algorithm = clusterer.name(),
            bucket,
            rows = rows.len(),
            k = ?selection.n_clusters,
            score = selection.score,
            "bucket split"
        );
        for (row, sub) in rows.iter().zip(selection.labels) {
            out[*row] = bucket * 10 + sub as u32;
        }
    }
    out
}

impl<'a> Segmenter<'a> {
    pub fn new(cfg: &'a ClusteringConfig) -> Self {
        Self { cfg }
    }

    /// Phase 1. Non-hierarchical ids are the tier times ten.
    pub fn initial_clusters(
        &self,
        table: &FeatureTable,
        views: &NormalizedViews,
        hierarchical: bool,
    ) -> Vec<u32> {
        let tiers: Vec<u32> = table.frequency().iter().map(|t| u32::from(*t)).collect();
        if !hierarchical {
            return tiers.iter().map(|t| t * 10).collect();
        }
        let phase = FeatureWeights::new(table.schema()).initial_phase();
        let kmeans = KMeans::from_config(self.cfg);
        split_buckets(
            &kmeans,
            views.standardized.view(),
            &phase,
            &tiers,
            &INITIAL_CANDIDATES,
        )
    }

    /// Phase 2 for one algorithm, over the view that algorithm consumes.
    pub fn final_clusters(
        &self,
        algorithm: Algorithm,
        table: &FeatureTable,
        views: &NormalizedViews,
        initial: &[u32],
        hierarchical: bool,
        time_weight: Option<u8>,
    ) -> Vec<u32> {
        let phase = FeatureWeights::new(table.schema()).final_phase(hierarchical, time_weight);
        let clusterer = clusterer_for(algorithm, self.cfg);
        split_buckets(
            clusterer.as_ref(),
            view_for(algorithm, views),
            &phase,
            initial,
            &final_candidates(hierarchical),
        )
    }

    #[tracing::instrument(skip_all, fields(riders = table.len(), hierarchical = hierarchical, time_weight = ?time_weight))]
    pub fn segment(
        &self,
        table: &FeatureTable,
        hierarchical: bool,
        time_weight: Option<u8>,
    ) -> Segmentation {
        let views = NormalizedViews::from_table(table);
        let initial = self.initial_clusters(table, &views, hierarchical);

        let run = |algorithm: Algorithm| {
            let labels =
                self.final_clusters(algorithm, table, &views, &initial, hierarchical, time_weight);
            let score = score_or_zero(view_for(algorithm, &views), &labels);
            info!(
                algorithm = algorithm.as_str(),
                clusters = distinct(&labels),
                score,
                "final segmentation done"
            );
            (labels, score)
        };
        let (kmeans, kmeans_score) = run(Algorithm::KMeans);
        let (lda, lda_score) = run(Algorithm::Lda);

        let rows = table
            .riders()
            .iter()
            .enumerate()
            .map(|(i, rider)| ClusterAssignment {
                rider_id: rider.clone(),
                tier: table.frequency()[i],
                initial_cluster: initial[i],
                kmeans: kmeans[i],
                lda: lda[i],
            })
            .collect();

        Segmentation {
            table: ClusterTable { rows },
            scores: ClusterScores {
                kmeans: kmeans_score,
                lda: lda_score,
            },
        }
    }
}

fn view_for(algorithm: Algorithm, views: &NormalizedViews) -> ArrayView2<'_, f64> {
    match algorithm {
        Algorithm::KMeans => views.standardized.view(),
        Algorithm::Lda => views.min_max.view(),
    }
}

fn distinct(labels: &[u32]) -> usize {
    let mut v = labels.to_vec();
    v.sort_unstable();
    v.dedup();
    v.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use ndarray::Array2;

    /// Two frequency tiers; within each, morning riders from one zipcode and
    /// evening riders from another.
    fn synthetic_table() -> FeatureTable {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        let schema = FeatureSchema::for_riders(
            &s(&["02139", "02150"]),
            &s(&["Monthly", "Stored Value"]),
            &s(&["Adult"]),
            &s(&["Subway"]),
        );
        let mut riders = Vec::new();
        let mut frequency = Vec::new();
        let mut values = Array2::<f64>::zeros((16, schema.len()));
        for i in 0..16 {
            let tier = if i < 8 { 1 } else { 2 };
            let morning = i % 2 == 0;
            let trips = if tier == 1 { 10.0 + (i % 3) as f64 } else { 30.0 + (i % 4) as f64 };
            let hour = if morning { 8 } else { 18 };
            let zip = if morning { "zipcode_02139" } else { "zipcode_02150" };
            let tariff = if i % 4 < 2 { "tariff_Monthly" } else { "tariff_Stored Value" };
            for (name, v) in [
                (format!("hr_0_{hour}"), trips),
                (zip.to_string(), trips),
                ("total_num_trips".to_string(), trips),
                ("weekday".to_string(), trips),
                (tariff.to_string(), trips),
                ("usertype_Adult".to_string(), trips),
                ("servicebrand_Subway".to_string(), trips),
                ("max_wkday_24_1".to_string(), hour as f64),
            ] {
                let c = schema.position(&name).unwrap();
                values[[i, c]] = v;
            }
            riders.push(format!("r{i:02}"));
            frequency.push(tier);
        }
        FeatureTable::new(schema, riders, values, frequency).unwrap()
    }

    fn segmenter_cfg() -> ClusteringConfig {
        ClusteringConfig {
            n_init: 3,
            ..ClusteringConfig::default()
        }
    }

    #[test]
    fn test_flat_ids_encode_tier_bucket() {
        let table = synthetic_table();
        let cfg = segmenter_cfg();
        let seg = Segmenter::new(&cfg).segment(&table, false, None);
        for row in &seg.table.rows {
            assert_eq!(row.initial_cluster, u32::from(row.tier) * 10);
            assert_eq!(row.kmeans / 10, row.initial_cluster);
            assert_eq!(row.lda / 10, row.initial_cluster);
            assert!(row.kmeans % 10 < 8);
        }
        assert!(seg.scores.kmeans > 0.0);
    }

    #[test]
    fn test_hierarchical_ids_nest() {
        let table = synthetic_table();
        let cfg = segmenter_cfg();
        let seg = Segmenter::new(&cfg).segment(&table, true, Some(60));
        for row in &seg.table.rows {
            assert_eq!(row.initial_cluster / 10, u32::from(row.tier));
            assert!(row.initial_cluster % 10 < 3);
            assert_eq!(row.kmeans / 10, row.initial_cluster);
            assert!(row.kmeans % 10 < 4);
        }
    }

    #[test]
    fn test_segmentation_is_idempotent() {
        let table = synthetic_table();
        let cfg = segmenter_cfg();
        let a = Segmenter::new(&cfg).segment(&table, true, None);
        let b = Segmenter::new(&cfg).segment(&table, true, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_bucket_becomes_single_sub_cluster() {
        let mut table = synthetic_table();
        // Keep a single tier-2 rider.
        let keep: Vec<usize> = (0..9).collect();
        table = FeatureTable::new(
            table.schema().clone(),
            keep.iter().map(|i| table.riders()[*i].clone()).collect(),
            table.values().select(ndarray::Axis(0), &keep),
            keep.iter().map(|i| table.frequency()[*i]).collect(),
        )
        .unwrap();
        let cfg = segmenter_cfg();
        let seg = Segmenter::new(&cfg).segment(&table, false, None);
        let last = &seg.table.rows[8];
        assert_eq!(last.initial_cluster, 20);
        assert_eq!(last.kmeans, 200);
        assert_eq!(last.lda, 200);
    }

    #[test]
    fn test_final_candidates() {
        assert_eq!(final_candidates(true), vec![2, 3, 4]);
        assert_eq!(final_candidates(false), vec![2, 3, 4, 5, 6, 7, 8]);
    }
}
