//! Parameter-keyed store for computed stage outputs.
//!
//! Layout below the cache root:
//! ```text
//! features/rider_features_{YYMM}_{D}.csv
//! clusters/{hierarchical|non_hierarchical}/results/rider_clusters_{YYMM}_{D}_{W}.csv
//! clusters/{hierarchical|non_hierarchical}/scores/rider_clusters_{YYMM}_{D}_{W}.json
//! profiles/{window label}/{view}_cluster_profiles_{YYMM}_{D}_{W}_{algo}.csv
//! profiles/{window label}/overview_cluster_profiles_{YYMM}_{D}.csv
//! runs.csv
//! ```
//! A cached file that cannot be read is reported and treated as absent.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::features::FeatureTable;
use crate::params::{ClusterParams, MonthWindow, ProfileParams, View};
use crate::profile::ProfileTable;
use crate::segmentation::{ClusterScores, ClusterTable, Segmentation};

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

/// Reads `path` with `read`, mapping a missing file to `None` and any other
/// failure to a logged miss.
fn load_or_miss<T>(path: &Path, read: impl FnOnce(&Path) -> Result<T>) -> Option<T> {
    match read(path) {
        Ok(value) => {
            debug!(path = %path.display(), "cache hit");
            Some(value)
        }
        Err(Error::DataNotFound { .. }) => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable cache entry ignored");
            None
        }
    }
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runs_path(&self) -> PathBuf {
        self.root.join("runs.csv")
    }

    pub fn features_path(&self, window: &MonthWindow) -> PathBuf {
        self.root.join("features").join(format!(
            "rider_features_{}_{}.csv",
            window.start, window.duration
        ))
    }

    fn clusters_dir(params: &ClusterParams) -> &'static str {
        if params.hierarchical {
            "hierarchical"
        } else {
            "non_hierarchical"
        }
    }

    fn cluster_stem(params: &ClusterParams) -> String {
        format!(
            "rider_clusters_{}_{}_{}",
            params.window.start,
            params.window.duration,
            params.time_weight_key()
        )
    }

    pub fn cluster_results_path(&self, params: &ClusterParams) -> PathBuf {
        self.root
            .join("clusters")
            .join(Self::clusters_dir(params))
            .join("results")
            .join(format!("{}.csv", Self::cluster_stem(params)))
    }

    pub fn cluster_scores_path(&self, params: &ClusterParams) -> PathBuf {
        self.root
            .join("clusters")
            .join(Self::clusters_dir(params))
            .join("scores")
            .join(format!("{}.json", Self::cluster_stem(params)))
    }

    pub fn profile_path(&self, params: &ProfileParams) -> PathBuf {
        let window = &params.cluster.window;
        let file = match params.view() {
            View::Overview => format!(
                "overview_cluster_profiles_{}_{}.csv",
                window.start, window.duration
            ),
            view => format!(
                "{}_cluster_profiles_{}_{}_{}_{}.csv",
                view.as_str(),
                window.start,
                window.duration,
                params.cluster.time_weight_key(),
                params.algorithm
            ),
        };
        self.root.join("profiles").join(window.label()).join(file)
    }

    pub fn load_features(&self, window: &MonthWindow) -> Option<FeatureTable> {
        load_or_miss(&self.features_path(window), FeatureTable::read_csv)
    }

    pub fn store_features(&self, window: &MonthWindow, table: &FeatureTable) -> Result<PathBuf> {
        let path = self.features_path(window);
        table.write_csv(&path)?;
        Ok(path)
    }

    /// Both halves of a segmentation must be present for a hit.
    pub fn load_clusters(&self, params: &ClusterParams) -> Option<Segmentation> {
        let table = load_or_miss(&self.cluster_results_path(params), ClusterTable::read_csv)?;
        let scores = load_or_miss(&self.cluster_scores_path(params), ClusterScores::read_json)?;
        Some(Segmentation { table, scores })
    }

    pub fn store_clusters(&self, params: &ClusterParams, result: &Segmentation) -> Result<PathBuf> {
        let path = self.cluster_results_path(params);
        result.table.write_csv(&path)?;
        result.scores.write_json(&self.cluster_scores_path(params))?;
        Ok(path)
    }

    pub fn load_profile(&self, params: &ProfileParams) -> Option<ProfileTable> {
        load_or_miss(&self.profile_path(params), ProfileTable::read_csv)
    }

    pub fn store_profile(&self, params: &ProfileParams, table: &ProfileTable) -> Result<PathBuf> {
        let path = self.profile_path(params);
        table.write_csv(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Algorithm, MonthCode};

    fn window(duration: u32) -> MonthWindow {
        MonthWindow::new("1710".parse::<MonthCode>().unwrap(), duration).unwrap()
    }

    #[test]
    fn test_layout() {
        let cache = CacheStore::new("/cache");
        assert_eq!(
            cache.features_path(&window(1)),
            PathBuf::from("/cache/features/rider_features_1710_1.csv")
        );

        let params = ClusterParams::new(window(1), false, None).unwrap();
        assert_eq!(
            cache.cluster_results_path(&params),
            PathBuf::from("/cache/clusters/non_hierarchical/results/rider_clusters_1710_1_0.csv")
        );
        let params = ClusterParams::new(window(3), true, Some(40)).unwrap();
        assert_eq!(
            cache.cluster_scores_path(&params),
            PathBuf::from("/cache/clusters/hierarchical/scores/rider_clusters_1710_3_40.json")
        );

        let profile = ProfileParams::by_cluster(params, Algorithm::Lda);
        assert_eq!(
            cache.profile_path(&profile),
            PathBuf::from(
                "/cache/profiles/2017-Oct_to_2017-Dec/hierarchical_cluster_profiles_1710_3_40_lda.csv"
            )
        );
        assert_eq!(
            cache.profile_path(&ProfileParams::overview(window(1))),
            PathBuf::from("/cache/profiles/2017-Oct/overview_cluster_profiles_1710_1.csv")
        );
    }

    #[test]
    fn test_missing_and_unreadable_entries_are_misses() {
        let root = std::env::temp_dir().join("rider_segmentation_cache_miss");
        let _ = std::fs::remove_dir_all(&root);
        let cache = CacheStore::new(&root);
        let params = ClusterParams::new(window(1), true, None).unwrap();
        assert!(cache.load_features(&window(1)).is_none());
        assert!(cache.load_clusters(&params).is_none());

        let path = cache.cluster_scores_path(&params);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(cache.load_clusters(&params).is_none());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_cluster_round_trip() {
        let root = std::env::temp_dir().join("rider_segmentation_cache_clusters");
        let _ = std::fs::remove_dir_all(&root);
        let cache = CacheStore::new(&root);
        let params = ClusterParams::new(window(1), false, Some(70)).unwrap();
        let result = Segmentation {
            table: ClusterTable {
                rows: vec![crate::segmentation::ClusterAssignment {
                    rider_id: "r1".into(),
                    tier: 2,
                    initial_cluster: 2,
                    kmeans: 21,
                    lda: 23,
                }],
            },
            scores: ClusterScores {
                kmeans: 12.5,
                lda: 0.0,
            },
        };
        cache.store_clusters(&params, &result).unwrap();
        assert_eq!(cache.load_clusters(&params), Some(result));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
