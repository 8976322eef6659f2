//! The engine ties the dataset, the model store and the process flags
//! together behind the query operations.
//!
//! ```no_run
//! use cellcast::config::PipelineConfig;
//! use cellcast::core::Target;
//! use cellcast::engine::TelemetryEngine;
//!
//! let engine = TelemetryEngine::load_csv(PipelineConfig::default(), "telemetry.csv").unwrap();
//! engine.initialize().unwrap();
//! engine.train().unwrap();
//! let forecast = engine.predict("Austin", "5G", None, Target::Throughput).unwrap();
//! println!("{} points", forecast.points.len());
//! ```

use crate::analytics::{
    analyze_location_demand, analyze_time_patterns, analyze_usage, locality_listing, summarize,
    DatasetSummary, DemandMetric, DemandReport, LocalityInfo, TimeMetric, TimePatternReport,
    TimeRange, UsageQuery, UsageReport,
};
use crate::config::PipelineConfig;
use crate::core::{NetworkType, RawTable, Target, TelemetryTable};
use crate::error::Result;
use crate::forecast::{Forecaster, SegmentForecast};
use crate::models::{SegmentMap, SegmentMetrics, SegmentModelStore, Trainer, TrainingReport};
use crate::preprocess::Preprocessor;
use crate::state::{HealthStatus, ProcessState, TrainingGuard};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Shared pipeline state serving forecasts and analytics.
#[derive(Debug)]
pub struct TelemetryEngine {
    config: PipelineConfig,
    dataset: RwLock<Arc<TelemetryTable>>,
    store: SegmentModelStore,
    state: Arc<ProcessState>,
    last_report: RwLock<Option<Arc<TrainingReport>>>,
}

impl TelemetryEngine {
    /// Create an engine over an already cleaned table.
    pub fn new(config: PipelineConfig, dataset: TelemetryTable) -> Result<Self> {
        Self::with_state(config, dataset, Arc::new(ProcessState::new()))
    }

    /// As [`new`](Self::new), sharing existing process flags.
    pub fn with_state(
        config: PipelineConfig,
        dataset: TelemetryTable,
        state: Arc<ProcessState>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dataset: RwLock::new(Arc::new(dataset)),
            store: SegmentModelStore::new(),
            state,
            last_report: RwLock::new(None),
        })
    }

    /// Clean `raw` and create an engine over the result.
    pub fn from_raw(config: PipelineConfig, raw: &RawTable) -> Result<Self> {
        let preprocessor = Preprocessor::new(config.preprocess.clone());
        let (table, report) = preprocessor.clean_with_report(raw)?;
        info!(
            rows = report.rows,
            invalid_timestamps = report.invalid_timestamps,
            invalid_network_types = report.invalid_network_types,
            synthesized_localities = report.synthesized_localities,
            "dataset cleaned"
        );
        Self::new(config, table)
    }

    /// Read, clean and load a CSV dataset.
    pub fn load_csv(config: PipelineConfig, path: impl AsRef<Path>) -> Result<Self> {
        let raw = RawTable::from_csv_path(path)?;
        Self::from_raw(config, &raw)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Restore persisted models from the configured model directory.
    ///
    /// Returns the number of models restored.
    pub fn initialize(&self) -> Result<usize> {
        let restored = self.store.load(&self.config.model_dir)?;
        if !self.store.snapshot().is_empty() {
            self.state.mark_models_loaded();
        }
        info!(
            models = restored,
            dir = %self.config.model_dir.display(),
            "engine initialized"
        );
        Ok(restored)
    }

    /// The current dataset.
    pub fn dataset(&self) -> Arc<TelemetryTable> {
        Arc::clone(&self.dataset.read())
    }

    /// Replace the dataset as a whole.
    pub fn replace_dataset(&self, dataset: TelemetryTable) {
        let rows = dataset.len();
        *self.dataset.write() = Arc::new(dataset);
        info!(rows, "dataset replaced");
    }

    /// The currently published models.
    pub fn models(&self) -> Arc<SegmentMap> {
        self.store.snapshot()
    }

    /// Train on the calling thread.
    ///
    /// Fails with `TrainingInProgress` if a run is already active.
    pub fn train(&self) -> Result<TrainingReport> {
        let guard = self.state.try_begin_training()?;
        self.run_training(guard)
    }

    /// Train on a background worker.
    ///
    /// The slot is claimed before the worker starts, so a concurrent request
    /// fails here with `TrainingInProgress`.
    pub fn spawn_training(self: &Arc<Self>) -> Result<JoinHandle<Result<TrainingReport>>> {
        let guard = self.state.try_begin_training()?;
        let engine = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("cellcast-training".into())
            .spawn(move || engine.run_training(guard))?;
        Ok(handle)
    }

    fn run_training(&self, guard: TrainingGuard) -> Result<TrainingReport> {
        let dataset = self.dataset();
        let previous = self.store.snapshot();
        let trainer = Trainer::from_config(&self.config);

        let outcome = trainer.train(&dataset, &previous).map_err(|err| {
            error!(error = %err, "training run failed");
            err
        })?;
        let report = outcome.report;
        self.store.publish(outcome.map);
        self.state.mark_models_loaded();

        if let Err(err) = self.store.persist(&self.config.model_dir) {
            warn!(error = %err, "trained models could not be persisted");
        }
        *self.last_report.write() = Some(Arc::new(report.clone()));
        drop(guard);
        Ok(report)
    }

    /// Report of the last successful training run in this process.
    pub fn last_report(&self) -> Option<Arc<TrainingReport>> {
        self.last_report.read().clone()
    }

    /// Forecast a segment; `None` uses the configured default horizon.
    pub fn predict(
        &self,
        locality: &str,
        network_type: &str,
        horizon_hours: Option<i64>,
        target: Target,
    ) -> Result<SegmentForecast> {
        let forecaster = Forecaster::new(
            self.config.forecast.clone(),
            self.dataset(),
            self.store.snapshot(),
        );
        let horizon = horizon_hours.unwrap_or(self.config.forecast.default_horizon_hours);
        forecaster.predict(locality, network_type, horizon, target)
    }

    pub fn usage(&self, query: &UsageQuery) -> Result<UsageReport> {
        analyze_usage(&self.dataset(), query)
    }

    pub fn time_patterns(&self, locality: Option<&str>, metric: TimeMetric) -> Result<TimePatternReport> {
        analyze_time_patterns(&self.dataset(), locality, metric)
    }

    pub fn location_demand(&self, metric: DemandMetric, time_range: TimeRange) -> Result<DemandReport> {
        analyze_location_demand(&self.dataset(), metric, time_range, &self.config.analytics)
    }

    pub fn summary(&self) -> DatasetSummary {
        summarize(&self.dataset())
    }

    pub fn localities(&self) -> Vec<LocalityInfo> {
        locality_listing(&self.dataset())
    }

    pub fn network_types(&self) -> Vec<NetworkType> {
        self.dataset().network_types()
    }

    /// Recorded metrics keyed by segment name.
    ///
    /// Dataset segments without any model appear with empty metrics.
    pub fn metrics_snapshot(&self) -> BTreeMap<String, SegmentMetrics> {
        let mut metrics: BTreeMap<String, SegmentMetrics> = self
            .store
            .metrics_snapshot()
            .into_iter()
            .map(|(key, m)| (key.to_string(), m))
            .collect();
        for key in self.dataset().segments() {
            metrics.entry(key.to_string()).or_default();
        }
        metrics
    }

    pub fn health(&self) -> HealthStatus {
        self.state.health()
    }

    pub fn process_state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    /// Write the published models to the configured model directory.
    pub fn persist(&self) -> Result<usize> {
        self.store.persist(&self.config.model_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::core::TelemetryRecord;
    use chrono::{Duration, TimeZone, Utc};

    fn dataset() -> TelemetryTable {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let records = (0..48)
            .map(|h| {
                TelemetryRecord::new("Austin", Some(NetworkType::G5))
                    .with_timestamp(base + Duration::hours(h))
                    .with_throughput(50.0 + (h % 24) as f64)
                    .with_signal_strength(-70.0 - (h % 12) as f64)
            })
            .chain((0..3).map(|h| {
                TelemetryRecord::new("Dallas", Some(NetworkType::G4))
                    .with_timestamp(base + Duration::hours(h))
                    .with_throughput(20.0)
            }))
            .collect();
        crate::preprocess::derive_temporal_features(TelemetryTable::from_records(records))
    }

    fn engine(dir: &Path) -> TelemetryEngine {
        let config = PipelineConfig::default()
            .with_model_dir(dir)
            .with_training(TrainingConfig::default().with_min_samples(10));
        TelemetryEngine::new(config, dataset()).unwrap()
    }

    #[test]
    fn train_then_predict() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        assert!(!engine.health().models_loaded);

        let report = engine.train().unwrap();
        assert_eq!(report.trained.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(engine.health().models_loaded);
        assert!(!engine.health().training_in_progress);
        assert!(engine.last_report().is_some());

        let forecast = engine.predict("Austin", "5G", None, Target::Throughput).unwrap();
        assert_eq!(forecast.points.len(), 144);

        let err = engine.predict("Dallas", "4G", Some(6), Target::Throughput).unwrap_err();
        assert_eq!(err.code(), "SEGMENT_NOT_FOUND");
    }

    #[test]
    fn metrics_include_untrained_segments() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.train().unwrap();

        let metrics = engine.metrics_snapshot();
        assert!(metrics["Austin_5G"].throughput.is_some());
        assert!(metrics["Austin_5G"].signal_strength.is_some());
        assert_eq!(metrics["Dallas_4G"], SegmentMetrics::default());
    }

    #[test]
    fn initialize_restores_persisted_models() {
        let dir = tempfile::tempdir().unwrap();
        engine(dir.path()).train().unwrap();

        let fresh = engine(dir.path());
        assert_eq!(fresh.initialize().unwrap(), 2);
        assert!(fresh.health().models_loaded);
        // already populated: a second call restores nothing
        assert_eq!(fresh.initialize().unwrap(), 0);
        assert!(fresh.predict("Austin", "5G", Some(1), Target::SignalStrength).is_ok());
    }

    #[test]
    fn concurrent_training_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine(dir.path()));
        let _guard = engine.state.try_begin_training().unwrap();

        assert_eq!(engine.train().unwrap_err().code(), "TRAINING_IN_PROGRESS");
        assert_eq!(engine.spawn_training().unwrap_err().code(), "TRAINING_IN_PROGRESS");
    }

    #[test]
    fn background_training_releases_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine(dir.path()));
        let handle = engine.spawn_training().unwrap();
        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.trained.len(), 2);
        assert!(!engine.health().training_in_progress);
        assert!(engine.train().is_ok());
    }
}
