//! Pipeline configuration.
//!
//! Every section has defaults, so a JSON file only needs the keys it
//! overrides:
//!
//! ```
//! use cellcast::config::PipelineConfig;
//!
//! let config: PipelineConfig =
//!     serde_json::from_str(r#"{ "training": { "min_samples": 20 } }"#).unwrap();
//! assert_eq!(config.training.min_samples, 20);
//! assert_eq!(config.forecast.interval_minutes, 10);
//! ```

use crate::analytics::DemandWeights;
use crate::error::{Result, TelemetryError};
use crate::utils::SignalThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Cleaning and splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Fraction of rows (most recent) held out for evaluation.
    pub test_fraction: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { test_fraction: 0.2 }
    }
}

impl PreprocessConfig {
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }
}

/// Per-segment model fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Segments with fewer usable rows than this are skipped.
    pub min_samples: usize,
    /// L2 penalty of the linear regressors.
    pub ridge_alpha: f64,
    /// Include latitude/longitude as features when available.
    pub spatial_features: bool,
    /// Bands used for signal classification metrics.
    pub signal_thresholds: SignalThresholds,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            ridge_alpha: 1e-3,
            spatial_features: true,
            signal_thresholds: SignalThresholds::default(),
        }
    }
}

impl TrainingConfig {
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_ridge_alpha(mut self, alpha: f64) -> Self {
        self.ridge_alpha = alpha;
        self
    }

    pub fn with_spatial_features(mut self, enabled: bool) -> Self {
        self.spatial_features = enabled;
        self
    }
}

/// Forecast generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Spacing of forecast points.
    pub interval_minutes: u32,
    /// Horizon used when a request gives none.
    pub default_horizon_hours: i64,
    /// Longest horizon a request may ask for.
    pub max_horizon_hours: i64,
    /// Two-sided confidence level of the bounds.
    pub confidence_level: f64,
    /// Recent observations used for the throughput level correction.
    pub context_window: usize,
    /// Throughput points below this are flagged, in Mbps.
    pub throughput_threshold: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
            default_horizon_hours: 24,
            max_horizon_hours: 24 * 30,
            confidence_level: 0.95,
            context_window: 6,
            throughput_threshold: 5.0,
        }
    }
}

impl ForecastConfig {
    pub fn with_interval_minutes(mut self, minutes: u32) -> Self {
        self.interval_minutes = minutes;
        self
    }

    pub fn with_max_horizon_hours(mut self, hours: i64) -> Self {
        self.max_horizon_hours = hours;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub demand_weights: DemandWeights,
    /// Window kept by the "current" demand time range.
    pub recency_window_hours: i64,
    /// Size of the high/low demand lists.
    pub top_n: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            demand_weights: DemandWeights::default(),
            recency_window_hours: crate::analytics::RECENCY_WINDOW_HOURS,
            top_n: 5,
        }
    }
}

impl AnalyticsConfig {
    pub fn with_demand_weights(mut self, weights: DemandWeights) -> Self {
        self.demand_weights = weights;
        self
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
    pub analytics: AnalyticsConfig,
    /// Directory holding the scaler artifact and persisted models.
    pub model_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            training: TrainingConfig::default(),
            forecast: ForecastConfig::default(),
            analytics: AnalyticsConfig::default(),
            model_dir: PathBuf::from("models"),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_preprocess(mut self, preprocess: PreprocessConfig) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_forecast(mut self, forecast: ForecastConfig) -> Self {
        self.forecast = forecast;
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.analytics = analytics;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TelemetryError::InvalidParameter(msg));

        if !(0.0..1.0).contains(&self.preprocess.test_fraction) {
            return invalid(format!(
                "test_fraction must be in [0, 1), got {}",
                self.preprocess.test_fraction
            ));
        }
        if self.training.min_samples < 2 {
            return invalid("min_samples must be at least 2".into());
        }
        if !self.training.ridge_alpha.is_finite() || self.training.ridge_alpha < 0.0 {
            return invalid(format!(
                "ridge_alpha must be finite and non-negative, got {}",
                self.training.ridge_alpha
            ));
        }
        let t = &self.training.signal_thresholds;
        if t.fair > t.good {
            return invalid("signal fair threshold must not exceed good threshold".into());
        }
        let f = &self.forecast;
        if f.interval_minutes == 0 || 60 % f.interval_minutes != 0 {
            return invalid(format!(
                "interval_minutes must divide 60, got {}",
                f.interval_minutes
            ));
        }
        if f.max_horizon_hours <= 0 {
            return invalid(format!(
                "max_horizon_hours must be positive, got {}",
                f.max_horizon_hours
            ));
        }
        if f.default_horizon_hours <= 0 || f.default_horizon_hours > f.max_horizon_hours {
            return Err(TelemetryError::InvalidHorizon(f.default_horizon_hours));
        }
        if !(f.confidence_level > 0.0 && f.confidence_level < 1.0) {
            return invalid(format!(
                "confidence_level must be in (0, 1), got {}",
                f.confidence_level
            ));
        }
        if f.context_window == 0 {
            return invalid("context_window must be positive".into());
        }
        self.analytics.demand_weights.validate()?;
        if self.analytics.recency_window_hours <= 0 {
            return invalid("recency_window_hours must be positive".into());
        }
        if self.analytics.top_n == 0 {
            return invalid("top_n must be positive".into());
        }
        Ok(())
    }
}
