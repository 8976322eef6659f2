//! # cellcast
//!
//! Feature engineering, per-segment forecasting and demand analytics for
//! cellular network telemetry.
//!
//! Raw measurements are cleaned into a [`core::TelemetryTable`], one ridge
//! model per (locality, network type, target) is trained on calendar and
//! trend features, and the [`engine::TelemetryEngine`] serves forecasts and
//! aggregate analyses over the same dataset.
//!
//! ```
//! use cellcast::prelude::*;
//!
//! let raw = RawTable::from_rows(
//!     &["Timestamp", "Locality", "Network Type", "Data Throughput (Mbps)"],
//!     &[
//!         vec!["2024-01-01 08:00", "Austin", "5G", "120.5"],
//!         vec!["2024-01-01 09:00", "Austin", "4G", ""],
//!     ],
//! );
//! let engine = TelemetryEngine::from_raw(PipelineConfig::default(), &raw).unwrap();
//! let usage = engine.usage(&UsageQuery::default()).unwrap();
//! assert_eq!(usage.total_records, 2);
//! ```

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod analytics;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod models;
pub mod preprocess;
pub mod state;
pub mod transform;
pub mod utils;

pub use error::{Result, TelemetryError};

pub mod prelude {
    pub use crate::analytics::{DemandMetric, DemandWeights, TimeMetric, TimeRange, UsageQuery};
    pub use crate::config::PipelineConfig;
    pub use crate::core::{NetworkType, RawTable, SegmentKey, Target, TelemetryRecord, TelemetryTable};
    pub use crate::engine::TelemetryEngine;
    pub use crate::error::{ErrorKind, Result, TelemetryError};
    pub use crate::forecast::SegmentForecast;
    pub use crate::preprocess::Preprocessor;
    pub use crate::utils::{confidence_interval, regression_metrics, RegressionMetrics};
}
