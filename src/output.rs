//! Run log persistence and printing.
//!
//! Every computed stage leaves one [`RunRecord`] row in the cache's run log.

use chrono::{SecondsFormat, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::params::{Algorithm, ClusterParams, MonthWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Features,
    Clusters,
    Profile,
}

/// One computed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub stage: Stage,
    pub month: String,
    pub duration: u32,
    pub hierarchical: Option<bool>,
    pub time_weight: Option<u8>,
    pub algorithm: Option<Algorithm>,
    pub rows: usize,
    pub clusters: Option<usize>,
    pub score: Option<f64>,
}

impl RunRecord {
    fn new(stage: Stage, window: &MonthWindow, rows: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            stage,
            month: window.start.to_string(),
            duration: window.duration,
            hierarchical: None,
            time_weight: None,
            algorithm: None,
            rows,
            clusters: None,
            score: None,
        }
    }

    pub fn features(window: &MonthWindow, riders: usize) -> Self {
        Self::new(Stage::Features, window, riders)
    }

    pub fn clusters(params: &ClusterParams, riders: usize, kmeans_score: f64, lda_score: f64) -> Self {
        Self {
            hierarchical: Some(params.hierarchical),
            time_weight: params.time_weight,
            score: Some(kmeans_score.max(lda_score)),
            ..Self::new(Stage::Clusters, &params.window, riders)
        }
    }

    pub fn profile(params: &ClusterParams, algorithm: Option<Algorithm>, clusters: usize) -> Self {
        Self {
            hierarchical: algorithm.map(|_| params.hierarchical),
            time_weight: algorithm.and(params.time_weight),
            algorithm,
            clusters: Some(clusters),
            ..Self::new(Stage::Profile, &params.window, clusters)
        }
    }
}

pub fn print_pretty(record: &RunRecord) {
    debug!("{:#?}", record);
}

/// Appends `record` to the CSV at `path`, writing the header only when the
/// file is created.
pub fn append_record(path: &Path, record: &RunRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending run record");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MonthCode;
    use std::env;
    use std::fs;

    fn window() -> MonthWindow {
        MonthWindow::new("1710".parse::<MonthCode>().unwrap(), 1).unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_print_does_not_panic() {
        let record = RunRecord::features(&window(), 10);
        print_pretty(&record);
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("rider_segmentation_test_runs.csv");
        let _ = fs::remove_file(&path);

        let params = ClusterParams::new(window(), true, Some(30)).unwrap();
        append_record(&path, &RunRecord::features(&window(), 10)).unwrap();
        append_record(&path, &RunRecord::clusters(&params, 10, 3.5, 7.0)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
        assert!(lines[1].contains(",features,1710,1,,,,10,,"));
        assert!(lines[2].contains(",clusters,1710,1,true,30,,10,,7"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_records_read_back() {
        let path = temp_path("rider_segmentation_test_runs_read.csv");
        let _ = fs::remove_file(&path);

        let params = ClusterParams::new(window(), false, None).unwrap();
        let record = RunRecord::profile(&params, Some(Algorithm::Lda), 4);
        append_record(&path, &record).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let back: Vec<RunRecord> = rdr.deserialize().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(back, vec![record]);

        fs::remove_file(&path).unwrap();
    }
}
