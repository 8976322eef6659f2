//! Horizon forecasts from trained segment models.

use crate::config::ForecastConfig;
use crate::core::{NetworkType, SegmentKey, Target, TelemetryRecord, TelemetryTable};
use crate::error::{Result, TelemetryError};
use crate::forecast::{Forecast, ForecastPoint, SegmentForecast};
use crate::models::{ModelMetrics, SegmentMap, TrainedModel};
use crate::utils::confidence_interval;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Serves forecasts from a dataset snapshot and a published model map.
#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ForecastConfig,
    table: Arc<TelemetryTable>,
    models: Arc<SegmentMap>,
}

impl Forecaster {
    pub fn new(config: ForecastConfig, table: Arc<TelemetryTable>, models: Arc<SegmentMap>) -> Self {
        Self {
            config,
            table,
            models,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `target` for a segment over the next `horizon_hours`.
    ///
    /// # Errors
    ///
    /// Checked in order: `InvalidHorizon`, `InvalidNetworkType`,
    /// `MissingLocality`, `UnknownLocality`, `SegmentNotFound`.
    pub fn predict(
        &self,
        locality: &str,
        network_type: &str,
        horizon_hours: i64,
        target: Target,
    ) -> Result<SegmentForecast> {
        if horizon_hours <= 0 || horizon_hours > self.config.max_horizon_hours {
            return Err(TelemetryError::InvalidHorizon(horizon_hours));
        }
        let network: NetworkType = network_type.parse()?;
        let locality = self.table.resolve_locality(locality)?;

        let key = SegmentKey::new(locality, network);
        let model = self.models.get(&key, target).ok_or_else(|| TelemetryError::SegmentNotFound {
            locality: locality.to_string(),
            network_type: network.to_string(),
            target: target.to_string(),
        })?;

        let history = observed_history(&self.table, &key);
        let anchor = history
            .last()
            .and_then(|r| r.timestamp)
            .or(model.last_observed)
            .ok_or(TelemetryError::MissingTimestamps)?;

        let timestamps = self.future_timestamps(anchor, horizon_hours)?;
        let level_correction = match target {
            Target::Throughput => self.level_correction(model, &history)?,
            Target::SignalStrength => 0.0,
        };

        let mut forecast = self.forecast_values(model, &timestamps, level_correction)?;
        if target == Target::Throughput {
            forecast.map_values(|v| v.max(0.0));
        }

        let points = self.points(target, &timestamps, &forecast);
        let peak = points
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
            .cloned();

        debug!(
            segment = %key,
            %target,
            steps = points.len(),
            level_correction,
            "generated forecast"
        );

        Ok(SegmentForecast {
            locality: key.locality.clone(),
            network_type: network.to_string(),
            target,
            horizon_hours,
            interval_minutes: self.config.interval_minutes,
            anchor,
            confidence_level: forecast.has_intervals().then_some(self.config.confidence_level),
            level_correction,
            points,
            peak,
            metrics: ModelMetrics::from(model.as_ref()),
            trained_at: model.trained_at,
        })
    }

    /// `anchor + k·interval` for `k = 1..=horizon·60/interval`.
    ///
    /// Horizons outside `1..=max_horizon_hours` fail with `InvalidHorizon`.
    pub fn future_timestamps(
        &self,
        anchor: DateTime<Utc>,
        horizon_hours: i64,
    ) -> Result<Vec<DateTime<Utc>>> {
        let interval = i64::from(self.config.interval_minutes);
        if interval <= 0 {
            return Err(TelemetryError::InvalidParameter(
                "forecast interval must be positive".into(),
            ));
        }
        if horizon_hours <= 0 || horizon_hours > self.config.max_horizon_hours {
            return Err(TelemetryError::InvalidHorizon(horizon_hours));
        }
        let steps = horizon_hours
            .checked_mul(60)
            .map(|minutes| minutes / interval)
            .ok_or(TelemetryError::InvalidHorizon(horizon_hours))?;
        (1..=steps)
            .map(|k| {
                k.checked_mul(interval)
                    .and_then(Duration::try_minutes)
                    .and_then(|offset| anchor.checked_add_signed(offset))
                    .ok_or(TelemetryError::InvalidHorizon(horizon_hours))
            })
            .collect()
    }

    /// Mean residual of the model over the most recent observations.
    fn level_correction(&self, model: &TrainedModel, history: &[&TelemetryRecord]) -> Result<f64> {
        let window = self.config.context_window;
        if window == 0 {
            return Ok(0.0);
        }
        let mut residuals = Vec::with_capacity(window);
        for record in history.iter().rev() {
            if residuals.len() == window {
                break;
            }
            let (Some(ts), Some(actual)) = (record.timestamp, model.target.value(record)) else {
                continue;
            };
            let predicted = model.predict_at(&ts, record.latitude, record.longitude)?;
            residuals.push(actual - predicted);
        }
        if residuals.is_empty() {
            return Ok(0.0);
        }
        Ok(residuals.iter().sum::<f64>() / residuals.len() as f64)
    }

    fn forecast_values(
        &self,
        model: &TrainedModel,
        timestamps: &[DateTime<Utc>],
        level_correction: f64,
    ) -> Result<Forecast> {
        let values = timestamps
            .iter()
            .map(|ts| Ok(model.predict_at(ts, None, None)? + level_correction))
            .collect::<Result<Vec<f64>>>()?;

        match model.prediction_std() {
            Some(std) if std.is_finite() => {
                let stds = vec![std; values.len()];
                let ci = confidence_interval(&values, &stds, self.config.confidence_level)?;
                Ok(Forecast::from_values_with_intervals(values, ci.lower, ci.upper))
            }
            _ => Ok(Forecast::from_values(values)),
        }
    }

    fn points(
        &self,
        target: Target,
        timestamps: &[DateTime<Utc>],
        forecast: &Forecast,
    ) -> Vec<ForecastPoint> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                let value = forecast.point()[i];
                ForecastPoint {
                    timestamp: *ts,
                    value,
                    lower: forecast.lower().map(|l| l[i]),
                    upper: forecast.upper().map(|u| u[i]),
                    below_threshold: target == Target::Throughput
                        && value < self.config.throughput_threshold,
                }
            })
            .collect()
    }
}

/// Timestamped records of a segment in time order.
fn observed_history<'a>(table: &'a TelemetryTable, key: &SegmentKey) -> Vec<&'a TelemetryRecord> {
    let mut history: Vec<&TelemetryRecord> = table
        .segment_records(key)
        .into_iter()
        .filter(|r| r.timestamp.is_some())
        .collect();
    history.sort_by_key(|r| r.timestamp);
    history
}
