//! A fitted segment model with its scaler, features and recorded metrics.

use crate::core::{SegmentKey, Target};
use crate::error::{Result, TelemetryError};
use crate::models::{LinearRegressor, Regressor};
use crate::preprocess::{column_names, feature_row, FeatureColumn};
use crate::transform::StandardScaler;
use crate::utils::{ClassificationMetrics, RegressionMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A regressor trained for one segment and target.
///
/// The scaler is shared by every model of the same training run.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub key: SegmentKey,
    pub target: Target,
    pub regressor: LinearRegressor,
    pub feature_columns: Vec<FeatureColumn>,
    pub scaler: Arc<StandardScaler>,
    pub metrics: RegressionMetrics,
    pub classification: Option<ClassificationMetrics>,
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Latest timestamp of the segment's training data.
    pub last_observed: Option<DateTime<Utc>>,
    pub mean_latitude: Option<f64>,
    pub mean_longitude: Option<f64>,
}

impl TrainedModel {
    /// Predict the target at a timestamp and location.
    ///
    /// Missing coordinates fall back to the segment's mean coordinates.
    pub fn predict_at(
        &self,
        timestamp: &DateTime<Utc>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<f64> {
        let row = feature_row(
            timestamp,
            latitude.or(self.mean_latitude),
            longitude.or(self.mean_longitude),
            &self.feature_columns,
        )
        .ok_or_else(|| {
            TelemetryError::InvalidParameter(format!(
                "segment {} has no coordinates for spatial features",
                self.key
            ))
        })?;
        let scaled = self.scaler.transform_row(&row)?;
        self.regressor.predict_row(&scaled)
    }

    /// Standard deviation of a single prediction, if known.
    pub fn prediction_std(&self) -> Option<f64> {
        self.regressor.prediction_std()
    }

    /// Serializable form.
    ///
    /// The scaler is embedded only when it differs from `shared`, the
    /// artifact persisted once for the whole store.
    pub fn to_persisted(&self, shared: Option<&StandardScaler>) -> PersistedModel {
        let own_scaler = match shared {
            Some(shared) if *shared == *self.scaler => None,
            _ => Some(self.scaler.as_ref().clone()),
        };
        PersistedModel {
            key: self.key.clone(),
            target: self.target,
            regressor: self.regressor.clone(),
            feature_columns: self.feature_columns.clone(),
            metrics: self.metrics,
            classification: self.classification.clone(),
            trained_at: self.trained_at,
            train_samples: self.train_samples,
            test_samples: self.test_samples,
            last_observed: self.last_observed,
            mean_latitude: self.mean_latitude,
            mean_longitude: self.mean_longitude,
            scaler: own_scaler,
        }
    }

    /// Rebuild a model from its persisted form.
    ///
    /// `shared` is used unless the model carries its own scaler.
    pub fn from_persisted(persisted: PersistedModel, shared: Arc<StandardScaler>) -> Result<Self> {
        let scaler = match persisted.scaler {
            Some(own) => Arc::new(own),
            None => shared,
        };
        let names = column_names(&persisted.feature_columns);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        scaler.check_columns(&names)?;
        if !persisted.regressor.is_fitted() {
            return Err(TelemetryError::InvalidParameter(format!(
                "persisted model for {} is not fitted",
                persisted.key
            )));
        }
        Ok(Self {
            key: persisted.key,
            target: persisted.target,
            regressor: persisted.regressor,
            feature_columns: persisted.feature_columns,
            scaler,
            metrics: persisted.metrics,
            classification: persisted.classification,
            trained_at: persisted.trained_at,
            train_samples: persisted.train_samples,
            test_samples: persisted.test_samples,
            last_observed: persisted.last_observed,
            mean_latitude: persisted.mean_latitude,
            mean_longitude: persisted.mean_longitude,
        })
    }
}

/// On-disk model representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedModel {
    pub key: SegmentKey,
    pub target: Target,
    pub regressor: LinearRegressor,
    pub feature_columns: Vec<FeatureColumn>,
    pub metrics: RegressionMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationMetrics>,
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub last_observed: Option<DateTime<Utc>>,
    pub mean_latitude: Option<f64>,
    pub mean_longitude: Option<f64>,
    /// Present when the model was trained with a scaler other than the
    /// store's shared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::preprocess::FeatureMatrix;
    use chrono::{Duration, TimeZone};

    /// A throughput model fitted on an hourly linear trend.
    pub fn trend_model(key: SegmentKey) -> TrainedModel {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let columns = vec![FeatureColumn::EpochHours];
        let rows: Vec<Vec<f64>> = (0..24)
            .map(|h| feature_row(&(base + Duration::hours(h)), None, None, &columns).unwrap())
            .collect();
        let matrix = FeatureMatrix::from_rows(column_names(&columns), &rows).unwrap();
        let scaler = Arc::new(StandardScaler::fit(&matrix, &["epoch_hours"]).unwrap());
        let scaled = scaler.transform(&matrix).unwrap();
        let y: Vec<f64> = (0..24).map(|h| 10.0 + h as f64).collect();

        let mut regressor = LinearRegressor::new(1e-6);
        regressor.fit(&scaled, &y).unwrap();

        TrainedModel {
            key,
            target: Target::Throughput,
            regressor,
            feature_columns: columns,
            scaler,
            metrics: RegressionMetrics {
                rmse: 0.0,
                mae: 0.0,
                mape: 0.0,
                r2: 1.0,
            },
            classification: None,
            trained_at: base + Duration::hours(24),
            train_samples: 24,
            test_samples: 0,
            last_observed: Some(base + Duration::hours(23)),
            mean_latitude: None,
            mean_longitude: None,
        }
    }
}
