//! Stage orchestrator.
//!
//! Stages form a chain: features <- clusters <- profile. Each stage method
//! asks the orchestrator for its upstream output, which comes from the cache
//! when a matching entry exists and is recomputed (and cached) otherwise.

use std::sync::OnceLock;
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::census::Census;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::{FeatureTable, FeatureTableBuilder};
use crate::ingest::InputSources;
use crate::output::{RunRecord, append_record, print_pretty};
use crate::params::{Algorithm, ClusterParams, MonthWindow, ProfileParams};
use crate::profile::{ProfileTable, Profiler};
use crate::report::{RiderTypeClassifier, RuleBasedClassifier};
use crate::segmentation::{Segmentation, Segmenter};

pub struct Pipeline {
    config: PipelineConfig,
    cache: CacheStore,
    inputs: InputSources,
    classifier: Box<dyn RiderTypeClassifier>,
    census: OnceLock<Census>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            cache: CacheStore::new(config.cache_dir()),
            inputs: InputSources::new(config.input_dir()),
            classifier: Box::new(RuleBasedClassifier),
            census: OnceLock::new(),
            config,
        }
    }

    /// Replaces the rider-type classifier used for reports.
    pub fn with_classifier(mut self, classifier: Box<dyn RiderTypeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn inputs(&self) -> &InputSources {
        &self.inputs
    }

    /// The census table, read from the input directory on first use.
    pub fn census(&self) -> Result<&Census> {
        if let Some(census) = self.census.get() {
            return Ok(census);
        }
        let census = Census::load(&self.inputs.census_file())?;
        info!(zipcodes = census.len(), "Census loaded");
        Ok(self.census.get_or_init(|| census))
    }

    fn log_run(&self, record: RunRecord) {
        print_pretty(&record);
        if let Err(e) = append_record(&self.cache.runs_path(), &record) {
            warn!(error = %e, "failed to append run record");
        }
    }

    #[tracing::instrument(skip(self), fields(month = %window.start, duration = window.duration))]
    pub fn features(&self, window: &MonthWindow) -> Result<FeatureTable> {
        if let Some(table) = self.cache.load_features(window) {
            return Ok(table);
        }

        let transactions = self.inputs.load_transactions(window, &self.config.ingest)?;
        let builder = FeatureTableBuilder::new(&self.config.filtering, window.duration);
        let (table, summary) = builder.build(&transactions)?;
        info!(
            transactions = transactions.len(),
            riders_seen = summary.riders_seen,
            infrequent = summary.infrequent,
            commuter_rail = summary.commuter_rail,
            kept = summary.kept,
            "Feature table built"
        );

        let path = self.cache.store_features(window, &table)?;
        info!(path = %path.display(), "Features cached");
        self.log_run(RunRecord::features(window, table.len()));
        Ok(table)
    }

    /// Segments the riders of `params.window`. A cached result that no longer
    /// lines up with the feature table is discarded.
    #[tracing::instrument(skip(self), fields(month = %params.window.start, duration = params.window.duration))]
    pub fn clusters(&self, params: &ClusterParams) -> Result<(FeatureTable, Segmentation)> {
        let features = self.features(&params.window)?;
        if let Some(cached) = self.cache.load_clusters(params) {
            match cached.table.check_aligned(&features) {
                Ok(()) => return Ok((features, cached)),
                Err(e) => warn!(error = %e, "stale cluster cache ignored"),
            }
        }

        let result = Segmenter::new(&self.config.clustering).segment(
            &features,
            params.hierarchical,
            params.time_weight,
        );
        let path = self.cache.store_clusters(params, &result)?;
        info!(
            path = %path.display(),
            kmeans_score = result.scores.kmeans,
            lda_score = result.scores.lda,
            "Clusters cached"
        );
        self.log_run(RunRecord::clusters(
            params,
            features.len(),
            result.scores.kmeans,
            result.scores.lda,
        ));
        Ok((features, result))
    }

    #[tracing::instrument(skip(self), fields(view = params.view().as_str(), algorithm = %params.algorithm))]
    pub fn profile(&self, params: &ProfileParams) -> Result<ProfileTable> {
        if let Some(table) = self.cache.load_profile(params) {
            return Ok(table);
        }

        let (features, result) = self.clusters(&params.cluster)?;
        let census = self.census()?;
        let profiler = Profiler::new(census, self.classifier.as_ref());
        let table = profiler.profile(&features, &result.table, params.algorithm, params.by_cluster)?;

        let path = self.cache.store_profile(params, &table)?;
        info!(path = %path.display(), clusters = table.len(), "Profile cached");
        let algorithm = params.by_cluster.then_some(params.algorithm);
        self.log_run(RunRecord::profile(&params.cluster, algorithm, table.len()));
        Ok(table)
    }

    /// Every profile a dashboard serves for `window`: both modes with both
    /// algorithms, then the overview.
    #[tracing::instrument(skip(self), fields(month = %window.start, duration = window.duration))]
    pub fn run_all(
        &self,
        window: &MonthWindow,
        time_weight: Option<u8>,
    ) -> Result<Vec<(ProfileParams, ProfileTable)>> {
        let mut out = Vec::with_capacity(5);
        for hierarchical in [true, false] {
            let cluster = ClusterParams::new(*window, hierarchical, time_weight)?;
            for algorithm in Algorithm::ALL {
                let params = ProfileParams::by_cluster(cluster, algorithm);
                let table = self.profile(&params)?;
                out.push((params, table));
            }
        }
        let overview = ProfileParams::overview(*window);
        let table = self.profile(&overview)?;
        out.push((overview, table));
        Ok(out)
    }
}
