//! Per-segment training runs.
//!
//! A run fits one scaler on the global temporal training partition, then
//! fits a ridge regressor per (segment, target). Failures stay local to
//! their segment: they are reported and the previous model, if any, is
//! carried into the new map.

use crate::config::{PipelineConfig, PreprocessConfig, TrainingConfig};
use crate::core::{SegmentKey, Target, TelemetryRecord, TelemetryTable};
use crate::error::{Result, TelemetryError};
use crate::models::{LinearRegressor, Regressor, SegmentMap, TrainedModel};
use crate::preprocess::{column_names, temporal_split, FeatureColumn, FeatureMatrix, Preprocessor};
use crate::transform::StandardScaler;
use crate::utils::{
    classification_metrics, mean_present, regression_metrics, RegressionMetrics, SignalBand,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A model fitted during the run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainedSummary {
    pub segment: SegmentKey,
    pub target: Target,
    pub train_samples: usize,
    pub test_samples: usize,
    pub metrics: RegressionMetrics,
}

/// A segment/target left without a model for lack of data.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSegment {
    pub segment: SegmentKey,
    pub target: Target,
    pub samples: usize,
    pub min_samples: usize,
}

/// A segment/target whose fit failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSegment {
    pub segment: SegmentKey,
    pub target: Target,
    pub code: &'static str,
    pub reason: String,
    /// Whether the previous model was kept in its place.
    pub carried_over: bool,
}

/// What a training run did.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feature_columns: Vec<String>,
    pub trained: Vec<TrainedSummary>,
    pub skipped: Vec<SkippedSegment>,
    pub failed: Vec<FailedSegment>,
}

impl TrainingReport {
    pub fn carried_over(&self) -> usize {
        self.failed.iter().filter(|f| f.carried_over).count()
    }
}

/// Result of a training run: the complete new map and its report.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub map: SegmentMap,
    pub report: TrainingReport,
}

/// Fits segment models from a cleaned table.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    preprocess: PreprocessConfig,
    training: TrainingConfig,
}

impl Trainer {
    pub fn new(preprocess: PreprocessConfig, training: TrainingConfig) -> Self {
        Self {
            preprocess,
            training,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.preprocess.clone(), config.training.clone())
    }

    /// Feature columns used for `table`.
    ///
    /// Spatial features are included only when every timestamped record
    /// has both coordinates.
    pub fn feature_columns(&self, table: &TelemetryTable) -> Vec<FeatureColumn> {
        let mut columns = FeatureColumn::TEMPORAL.to_vec();
        let spatial = self.training.spatial_features
            && table.columns().latitude
            && table.columns().longitude
            && table
                .records()
                .iter()
                .filter(|r| r.timestamp.is_some())
                .all(|r| r.latitude.is_some() && r.longitude.is_some());
        if spatial {
            columns.extend(FeatureColumn::SPATIAL);
        }
        columns
    }

    /// Train every segment of `table`.
    ///
    /// `previous` supplies the models kept for segments whose fit fails.
    pub fn train(&self, table: &TelemetryTable, previous: &SegmentMap) -> Result<TrainingOutcome> {
        let started_at = Utc::now();
        if table.is_empty() {
            return Err(TelemetryError::EmptyDataset);
        }
        if !table.has_timestamps() {
            return Err(TelemetryError::MissingTimestamps);
        }

        let columns = self.feature_columns(table);
        let scaler = self.fit_scaler(table, &columns)?;

        let mut map = SegmentMap::new(Some(Arc::clone(&scaler)));
        let mut trained = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        for (key, records) in table.partition_by_segment() {
            for target in Target::ALL {
                let rows: Vec<&TelemetryRecord> = records
                    .iter()
                    .copied()
                    .filter(|r| r.timestamp.is_some() && target.value(r).is_some())
                    .collect();

                if rows.len() < self.training.min_samples {
                    debug!(segment = %key, %target, samples = rows.len(), "skipping segment");
                    skipped.push(SkippedSegment {
                        segment: key.clone(),
                        target,
                        samples: rows.len(),
                        min_samples: self.training.min_samples,
                    });
                    continue;
                }

                match self.train_segment(&key, target, rows, &columns, &scaler) {
                    Ok(model) => {
                        debug!(
                            segment = %key,
                            %target,
                            rmse = model.metrics.rmse,
                            r2 = model.metrics.r2,
                            "trained segment model"
                        );
                        trained.push(TrainedSummary {
                            segment: key.clone(),
                            target,
                            train_samples: model.train_samples,
                            test_samples: model.test_samples,
                            metrics: model.metrics,
                        });
                        map.insert(Arc::new(model));
                    }
                    Err(err) => {
                        let prior = previous.get(&key, target).cloned();
                        warn!(
                            segment = %key,
                            %target,
                            error = %err,
                            carried_over = prior.is_some(),
                            "segment training failed"
                        );
                        failed.push(FailedSegment {
                            segment: key.clone(),
                            target,
                            code: err.code(),
                            reason: err.to_string(),
                            carried_over: prior.is_some(),
                        });
                        if let Some(model) = prior {
                            map.insert(model);
                        }
                    }
                }
            }
        }

        let report = TrainingReport {
            started_at,
            finished_at: Utc::now(),
            feature_columns: column_names(&columns),
            trained,
            skipped,
            failed,
        };
        info!(
            trained = report.trained.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "training run finished"
        );
        Ok(TrainingOutcome { map, report })
    }

    /// Fit the run's scaler on the global temporal training partition.
    fn fit_scaler(
        &self,
        table: &TelemetryTable,
        columns: &[FeatureColumn],
    ) -> Result<Arc<StandardScaler>> {
        let timestamped: Vec<&TelemetryRecord> =
            table.records().iter().filter(|r| r.timestamp.is_some()).collect();
        let (mut train, _) = temporal_split(timestamped.clone(), self.preprocess.test_fraction)?;
        if train.is_empty() {
            train = timestamped;
        }

        let matrix = FeatureMatrix::from_records(&train, columns)?;
        let names = column_names(columns);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut preprocessor = Preprocessor::new(self.preprocess.clone());
        let (_, scaler) = preprocessor.fit_scale(&matrix, &names)?;
        Ok(scaler)
    }

    fn train_segment(
        &self,
        key: &SegmentKey,
        target: Target,
        rows: Vec<&TelemetryRecord>,
        columns: &[FeatureColumn],
        scaler: &Arc<StandardScaler>,
    ) -> Result<TrainedModel> {
        self.fit_segment(key, target, rows, columns, scaler)
            .map_err(|err| TelemetryError::TrainingFailure {
                segment: format!("{}/{}", key, target),
                reason: err.to_string(),
            })
    }

    fn fit_segment(
        &self,
        key: &SegmentKey,
        target: Target,
        rows: Vec<&TelemetryRecord>,
        columns: &[FeatureColumn],
        scaler: &Arc<StandardScaler>,
    ) -> Result<TrainedModel> {
        let last_observed = rows.iter().filter_map(|r| r.timestamp).max();
        let mean_latitude = mean_present(rows.iter().map(|r| r.latitude));
        let mean_longitude = mean_present(rows.iter().map(|r| r.longitude));

        let (train, test) = temporal_split(rows, self.preprocess.test_fraction)?;
        if train.len() < 2 {
            return Err(TelemetryError::InsufficientData {
                needed: 2,
                got: train.len(),
            });
        }

        let target_values = |records: &[&TelemetryRecord]| -> Vec<f64> {
            records.iter().filter_map(|r| target.value(r)).collect()
        };

        let x_train = scaler.transform(&FeatureMatrix::from_records(&train, columns)?)?;
        let y_train = target_values(&train[..]);
        let mut regressor = LinearRegressor::new(self.training.ridge_alpha);
        regressor.fit(&x_train, &y_train)?;

        // Without a held-out partition, report in-sample quality
        let eval: &[&TelemetryRecord] = if test.is_empty() { &train } else { &test };
        let x_eval = scaler.transform(&FeatureMatrix::from_records(eval, columns)?)?;
        let y_eval = target_values(eval);
        let predicted = regressor.predict(&x_eval)?;
        let metrics = regression_metrics(&y_eval, &predicted)?;

        let classification = match target {
            Target::SignalStrength => {
                let thresholds = &self.training.signal_thresholds;
                let actual: Vec<SignalBand> =
                    y_eval.iter().map(|v| SignalBand::classify(*v, thresholds)).collect();
                let predicted: Vec<SignalBand> =
                    predicted.iter().map(|v| SignalBand::classify(*v, thresholds)).collect();
                Some(classification_metrics(&actual, &predicted)?)
            }
            Target::Throughput => None,
        };

        Ok(TrainedModel {
            key: key.clone(),
            target,
            regressor,
            feature_columns: columns.to_vec(),
            scaler: Arc::clone(scaler),
            metrics,
            classification,
            trained_at: Utc::now(),
            train_samples: train.len(),
            test_samples: test.len(),
            last_observed,
            mean_latitude,
            mean_longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NetworkType;
    use chrono::{Duration, TimeZone};

    fn segment_records(locality: &str, nt: NetworkType, n: i64, slope: f64) -> Vec<TelemetryRecord> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let ts = base + Duration::minutes(30 * i);
                TelemetryRecord::new(locality, Some(nt))
                    .with_timestamp(ts)
                    .with_throughput(20.0 + slope * i as f64)
                    .with_signal_strength(-75.0 + 0.1 * (i % 7) as f64)
                    .with_coordinates(30.0, -97.0)
            })
            .collect()
    }

    #[test]
    fn trains_segments_and_skips_small_ones() {
        let mut records = segment_records("Austin", NetworkType::G5, 40, 0.5);
        records.extend(segment_records("Waco", NetworkType::G4, 5, 0.0));
        let table = crate::preprocess::derive_temporal_features(TelemetryTable::from_records(records));

        let outcome = Trainer::default().train(&table, &SegmentMap::default()).unwrap();
        let austin = SegmentKey::new("Austin", NetworkType::G5);
        let waco = SegmentKey::new("Waco", NetworkType::G4);

        assert!(outcome.map.get(&austin, Target::Throughput).is_some());
        assert!(outcome.map.get(&austin, Target::SignalStrength).is_some());
        assert!(outcome.map.segment(&waco).is_none());
        assert_eq!(outcome.report.trained.len(), 2);
        assert_eq!(outcome.report.skipped.len(), 2);
        assert!(outcome.report.failed.is_empty());

        let model = outcome.map.get(&austin, Target::Throughput).unwrap();
        assert_eq!(model.train_samples, 32);
        assert_eq!(model.test_samples, 8);
        assert!(model.metrics.r2 > 0.9);
        assert!(model.classification.is_none());
        assert!(outcome.map.get(&austin, Target::SignalStrength).unwrap().classification.is_some());
        assert_eq!(model.feature_columns.len(), 9);
    }

    #[test]
    fn all_models_share_the_run_scaler() {
        let mut records = segment_records("Austin", NetworkType::G5, 20, 1.0);
        records.extend(segment_records("Dallas", NetworkType::G5, 20, 0.0));
        let table = TelemetryTable::from_records(records);
        let outcome = Trainer::default().train(&table, &SegmentMap::default()).unwrap();

        let scaler = outcome.map.scaler().unwrap();
        for model in outcome.map.models() {
            assert!(Arc::ptr_eq(&model.scaler, scaler));
        }
    }

    #[test]
    fn failed_segment_keeps_previous_model() {
        let records = segment_records("Austin", NetworkType::G5, 20, 1.0);
        let table = TelemetryTable::from_records(records.clone());
        let trainer = Trainer::default();
        let first = trainer.train(&table, &SegmentMap::default()).unwrap();

        // A single timestamp leaves one training row after the split
        let base = records[0].timestamp.unwrap();
        let degenerate: Vec<TelemetryRecord> = records
            .into_iter()
            .map(|r| r.with_timestamp(base))
            .collect();
        let trainer = Trainer::new(
            PreprocessConfig::default().with_test_fraction(0.95),
            TrainingConfig::default(),
        );
        let second = trainer
            .train(&TelemetryTable::from_records(degenerate), &first.map)
            .unwrap();

        let key = SegmentKey::new("Austin", NetworkType::G5);
        assert_eq!(second.report.failed.len(), 2);
        assert_eq!(second.report.carried_over(), 2);
        assert_eq!(second.report.failed[0].code, "TRAINING_FAILURE");
        let kept = second.map.get(&key, Target::Throughput).unwrap();
        assert!(Arc::ptr_eq(kept, first.map.get(&key, Target::Throughput).unwrap()));
    }

    #[test]
    fn empty_and_untimed_tables_fail() {
        let trainer = Trainer::default();
        let empty = TelemetryTable::default();
        assert_eq!(
            trainer.train(&empty, &SegmentMap::default()).unwrap_err(),
            TelemetryError::EmptyDataset
        );

        let untimed = TelemetryTable::from_records(vec![
            TelemetryRecord::new("A", Some(NetworkType::G4)).with_throughput(1.0),
        ]);
        assert_eq!(
            trainer.train(&untimed, &SegmentMap::default()).unwrap_err(),
            TelemetryError::MissingTimestamps
        );
    }

    #[test]
    fn spatial_features_need_coordinates_everywhere() {
        let mut records = segment_records("Austin", NetworkType::G5, 3, 0.0);
        let trainer = Trainer::default();
        assert_eq!(
            trainer.feature_columns(&TelemetryTable::from_records(records.clone())).len(),
            9
        );
        records[1].latitude = None;
        assert_eq!(
            trainer.feature_columns(&TelemetryTable::from_records(records)).len(),
            7
        );
    }
}
