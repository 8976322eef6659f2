//! Numeric utilities: metrics, least squares and descriptive statistics.

pub mod metrics;
pub mod ols;
pub mod stats;

pub use metrics::{
    classification_metrics, confidence_interval, mae, mape, r2, regression_metrics, rmse,
    ClassificationMetrics, ConfidenceInterval, RegressionMetrics, SignalBand, SignalThresholds,
};
pub use ols::{ols_fit, OLSResult};
pub use stats::{mean, mean_present, quantile_normal, std_dev, variance, ColumnStats};
