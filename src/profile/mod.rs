//! Cluster Profiler.
//!
//! Collapses clustered rider rows into one row per cluster: feature
//! distributions, expected demographics, 2D projection, then the rider-type
//! label and report.

mod demographics;
mod projection;
mod summary;
mod table;

pub use demographics::{demographic_columns, softmax, summarize_demographics};
pub use projection::{pca_2d, symmetric_eigen};
pub use summary::{FeatureSummary, distribution_blocks, mode, summarize, to_percentages};
pub use table::{
    ClusterProfile, DEMO_BASE_COLUMNS, ProfileColumn, ProfileGroup, ProfileTable, VIZ_COLUMNS,
};

use tracing::info;

use crate::census::Census;
use crate::error::Result;
use crate::features::{FeatureGroup, FeatureTable};
use crate::params::Algorithm;
use crate::report::{RiderTypeClassifier, annotate};
use crate::segmentation::ClusterTable;

/// Id of the single pseudo-cluster of an overview profile.
pub const OVERVIEW_CLUSTER: u32 = 0;

pub struct Profiler<'a> {
    census: &'a Census,
    classifier: &'a dyn RiderTypeClassifier,
}

impl<'a> Profiler<'a> {
    pub fn new(census: &'a Census, classifier: &'a dyn RiderTypeClassifier) -> Self {
        Self { census, classifier }
    }

    /// Profiles `features` grouped by `algorithm`'s final clusters, or as one
    /// population when `by_cluster` is false.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Inconsistent`] when `clusters` and `features` do not
    /// describe the same riders in the same order.
    #[tracing::instrument(skip_all, fields(algorithm = %algorithm, by_cluster = by_cluster, riders = features.len()))]
    pub fn profile(
        &self,
        features: &FeatureTable,
        clusters: &ClusterTable,
        algorithm: Algorithm,
        by_cluster: bool,
    ) -> Result<ProfileTable> {
        clusters.check_aligned(features)?;
        let labels = if by_cluster {
            clusters.labels(algorithm)
        } else {
            vec![OVERVIEW_CLUSTER; features.len()]
        };

        let summary = summarize(features, &labels);
        let zip_cols: Vec<usize> = summary
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group == ProfileGroup::Feature(FeatureGroup::Zipcode))
            .map(|(i, _)| i)
            .collect();
        let zipcodes: Vec<&str> = zip_cols.iter().map(|i| summary.columns[*i].key()).collect();
        let geo = summary.values.select(ndarray::Axis(1), &zip_cols);
        let (demo_columns, demo) = summarize_demographics(self.census, &zipcodes, geo.view());

        let coords = pca_2d(summary.values.view());
        let single = summary.clusters.len() == 1;

        let mut columns = summary.columns.clone();
        columns.extend(demo_columns);
        columns.extend(
            VIZ_COLUMNS
                .iter()
                .map(|n| ProfileColumn::new(ProfileGroup::Projection, *n)),
        );

        let rows = summary
            .clusters
            .iter()
            .enumerate()
            .map(|(r, cluster)| {
                let mut values = summary.values.row(r).to_vec();
                values.extend(demo.row(r).iter());
                let (pca1, pca2) = coords[r];
                let grp = if single { 0 } else { cluster / 100 };
                values.extend([pca1, pca2, summary.values[[r, 0]], f64::from(grp)]);
                ClusterProfile {
                    cluster: *cluster,
                    values,
                    rider_type: 0,
                    report: String::new(),
                }
            })
            .collect();

        let mut table = ProfileTable::new(columns, rows)?;
        annotate(&mut table, self.classifier);
        info!(clusters = table.len(), "profile built");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::report::RuleBasedClassifier;
    use crate::segmentation::ClusterAssignment;
    use ndarray::Array2;

    fn inputs() -> (FeatureTable, ClusterTable) {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        let schema = FeatureSchema::for_riders(&s(&["02139", "02140"]), &s(&["Monthly"]), &s(&["Adult"]), &s(&["Subway"]));
        let mut values = Array2::<f64>::zeros((4, schema.len()));
        let mut rows = Vec::new();
        for r in 0..4 {
            let (hour, zip, cluster) = if r < 2 { (8, "zipcode_02139", 101) } else { (22, "zipcode_02140", 203) };
            for name in [format!("hr_1_{hour}"), zip.to_string(), "total_num_trips".into(), "tariff_Monthly".into()] {
                values[[r, schema.position(&name).unwrap()]] = 12.0;
            }
            values[[r, schema.position("max_wkday_24_1").unwrap()]] = hour as f64;
            rows.push(ClusterAssignment {
                rider_id: format!("r{r}"),
                tier: 1,
                initial_cluster: cluster / 10,
                kmeans: cluster,
                lda: 100,
            });
        }
        let riders = rows.iter().map(|r| r.rider_id.clone()).collect();
        (
            FeatureTable::new(schema, riders, values, vec![1; 4]).unwrap(),
            ClusterTable { rows },
        )
    }

    #[test]
    fn test_profile_by_cluster() {
        let (features, clusters) = inputs();
        let census = Census::default();
        let profiler = Profiler::new(&census, &RuleBasedClassifier);
        let table = profiler.profile(&features, &clusters, Algorithm::KMeans, true).unwrap();

        assert_eq!(table.rows().iter().map(|r| r.cluster).collect::<Vec<_>>(), vec![101, 203]);
        assert_eq!(table.get(0, "cluster_size"), Some(2.0));
        assert_eq!(table.get(0, "hr_1_8"), Some(100.0));
        assert_eq!(table.get(1, "viz_grp"), Some(2.0));
        assert_eq!(table.get(0, "viz_size"), Some(2.0));
        assert!(table.rows()[0].report.contains("Tuesday 8:00"));
        assert!(table.rows()[0].report.contains("zipcode 02139"));
        assert_eq!(table.rows()[1].rider_type, crate::report::RiderType::EveningNight.id());
    }

    #[test]
    fn test_single_cluster_projects_to_origin() {
        let (features, clusters) = inputs();
        let census = Census::default();
        let profiler = Profiler::new(&census, &RuleBasedClassifier);
        for (algorithm, by_cluster) in [(Algorithm::Lda, true), (Algorithm::KMeans, false)] {
            let table = profiler.profile(&features, &clusters, algorithm, by_cluster).unwrap();
            assert_eq!(table.len(), 1);
            assert_eq!(table.get(0, "viz_pca1"), Some(0.0));
            assert_eq!(table.get(0, "viz_pca2"), Some(0.0));
            assert_eq!(table.get(0, "viz_grp"), Some(0.0));
        }
    }

    #[test]
    fn test_misaligned_clusters_are_rejected() {
        let (features, mut clusters) = inputs();
        clusters.rows.swap(0, 3);
        let census = Census::default();
        let profiler = Profiler::new(&census, &RuleBasedClassifier);
        assert!(matches!(
            profiler.profile(&features, &clusters, Algorithm::KMeans, true),
            Err(crate::Error::Inconsistent(_))
        ));
    }
}
