//! Cluster assignment table and run scores, with their on-disk forms.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result, open_input};
use crate::features::FeatureTable;
use crate::params::Algorithm;

/// One row of a segmentation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    #[serde(rename = "riderID")]
    pub rider_id: String,
    #[serde(rename = "group_by_frequency")]
    pub tier: u8,
    pub initial_cluster: u32,
    pub kmeans: u32,
    pub lda: u32,
}

impl ClusterAssignment {
    pub fn final_cluster(&self, algorithm: Algorithm) -> u32 {
        match algorithm {
            Algorithm::KMeans => self.kmeans,
            Algorithm::Lda => self.lda,
        }
    }
}

/// Cluster assignments in feature-table row order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterTable {
    pub rows: Vec<ClusterAssignment>,
}

impl ClusterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Final cluster id per row for `algorithm`.
    pub fn labels(&self, algorithm: Algorithm) -> Vec<u32> {
        self.rows.iter().map(|r| r.final_cluster(algorithm)).collect()
    }

    /// Distinct final cluster ids, ascending.
    pub fn cluster_ids(&self, algorithm: Algorithm) -> Vec<u32> {
        let mut ids = self.labels(algorithm);
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Fails unless row `i` of `features` is the same rider as row `i` here.
    pub fn check_aligned(&self, features: &FeatureTable) -> Result<()> {
        if self.len() != features.len() {
            return Err(Error::Inconsistent(format!(
                "{} cluster rows for {} feature rows",
                self.len(),
                features.len()
            )));
        }
        if let Some((row, rider)) = self
            .rows
            .iter()
            .zip(features.riders())
            .find(|(row, rider)| row.rider_id != **rider)
        {
            return Err(Error::Inconsistent(format!(
                "cluster row for rider {} lines up with feature row for rider {}",
                row.rider_id, rider
            )));
        }
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(open_input(path)?);
        let rows = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<ClusterAssignment>, csv::Error>>()?;
        Ok(Self { rows })
    }
}

/// Calinski–Harabasz score of each algorithm's final labels over the whole
/// (unweighted) feature view it clustered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterScores {
    pub kmeans: f64,
    pub lda: f64,
}

impl ClusterScores {
    pub fn get(&self, algorithm: Algorithm) -> f64 {
        match algorithm {
            Algorithm::KMeans => self.kmeans,
            Algorithm::Lda => self.lda,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let file = open_input(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
