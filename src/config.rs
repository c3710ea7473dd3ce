//! Pipeline configuration.
//!
//! Every component receives a [`PipelineConfig`] (or the sub-config it needs)
//! at construction. Stored on disk as a JSON object; any omitted key falls back
//! to its default:
//! ```json
//! {
//!   "data_dir": "data",
//!   "clustering": { "random_state": 12345, "max_iter": 200 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, open_input};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the data layout; `input/` and the cache live below it.
    pub data_dir: PathBuf,
    /// Input directory name under `data_dir`.
    pub input_subdir: String,
    /// Cache directory name under `data_dir`.
    pub cache_subdir: String,
    pub ingest: IngestConfig,
    pub filtering: FilterConfig,
    pub clustering: ClusteringConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            input_subdir: "input".to_string(),
            cache_subdir: "cache".to_string(),
            ingest: IngestConfig::default(),
            filtering: FilterConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = open_input(path.as_ref())?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Returns a config rooted at `data_dir` with every other value defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.data_dir.join(&self.input_subdir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(&self.cache_subdir)
    }
}

/// Which raw transactions count as station validations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub station_device_classes: Vec<i64>,
    pub validation_movement_types: Vec<i64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            station_device_classes: vec![411, 412, 441, 442, 443, 501, 503],
            validation_movement_types: vec![7, 20],
        }
    }
}

/// Rider labeling thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Riders with at most `min_trips_per_month * duration` trips are dropped.
    pub min_trips_per_month: u32,
    /// Upper bound (inclusive) of frequency tier 1, per month.
    pub frequent_trips_per_month: u32,
    pub commuter_rail_brand: String,
    /// Commuter-rail holders of this zone stay in the population.
    pub commuter_rail_exempt_zone: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_trips_per_month: 5,
            frequent_trips_per_month: 20,
            commuter_rail_brand: "Commuter Rail".to_string(),
            commuter_rail_exempt_zone: "1a".to_string(),
        }
    }
}

/// Parameters of the clustering algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub random_state: u64,
    /// K-means Lloyd iteration cap.
    pub max_iter: usize,
    /// K-means tolerance, relative to the mean per-column variance.
    pub tol: f64,
    /// K-means restarts; the lowest-inertia run wins.
    pub n_init: usize,
    /// LDA outer (EM) iterations.
    pub lda_max_iter: usize,
    /// LDA per-document E-step iteration cap.
    pub lda_max_doc_update_iter: usize,
    pub lda_mean_change_tol: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            random_state: 12345,
            max_iter: 200,
            tol: 1e-3,
            n_init: 10,
            lda_max_iter: 10,
            lda_max_doc_update_iter: 100,
            lda_mean_change_tol: 1e-3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"data_dir": "/tmp/x", "clustering": {"n_init": 3}}"#)
                .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/x"));
        assert_eq!(cfg.clustering.n_init, 3);
        assert_eq!(cfg.clustering.random_state, 12345);
        assert_eq!(cfg.filtering.min_trips_per_month, 5);
        assert_eq!(cfg.cache_dir(), PathBuf::from("/tmp/x/cache"));
    }

    #[test]
    fn test_load_missing_file_is_data_not_found() {
        let err = PipelineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::error::Error::DataNotFound { .. }));
    }
}
