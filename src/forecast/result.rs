//! Forecast result structures.

use crate::core::{SegmentKey, Target};
use crate::models::ModelMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point predictions with optional interval bounds, one value per step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    point: Vec<f64>,
    lower: Option<Vec<f64>>,
    upper: Option<Vec<f64>>,
}

impl Forecast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a forecast from point predictions.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            point: values,
            lower: None,
            upper: None,
        }
    }

    /// Create a forecast with prediction intervals.
    pub fn from_values_with_intervals(values: Vec<f64>, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self {
            point: values,
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Number of steps.
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> Option<&[f64]> {
        self.lower.as_deref()
    }

    pub fn upper(&self) -> Option<&[f64]> {
        self.upper.as_deref()
    }

    pub fn has_intervals(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    /// Apply `f` to the points and both bounds.
    pub fn map_values<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        for v in self.point.iter_mut() {
            *v = f(*v);
        }
        for bounds in [self.lower.as_mut(), self.upper.as_mut()].into_iter().flatten() {
            for v in bounds.iter_mut() {
                *v = f(*v);
            }
        }
    }
}

/// One timestamped forecast value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    /// Throughput below the configured threshold; always false for signal.
    pub below_threshold: bool,
}

/// Forecast of one segment and target over a horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentForecast {
    pub locality: String,
    pub network_type: String,
    pub target: Target,
    pub horizon_hours: i64,
    pub interval_minutes: u32,
    pub anchor: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<f64>,
    /// Mean residual added to every point.
    pub level_correction: f64,
    pub points: Vec<ForecastPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak: Option<ForecastPoint>,
    pub metrics: ModelMetrics,
    pub trained_at: DateTime<Utc>,
}

impl SegmentForecast {
    pub fn key(&self) -> Option<SegmentKey> {
        self.network_type
            .parse()
            .ok()
            .map(|nt| SegmentKey::new(self.locality.clone(), nt))
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}
