//! Error types for the cellcast pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Coarse classification of a [`TelemetryError`].
///
/// Callers use it to decide whether to report, degrade, or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input. Always reported, never retried internally.
    Input,
    /// The pipeline is not in a state that allows the operation.
    State,
    /// The dataset cannot support the operation.
    Data,
    /// A model fit failed.
    Training,
    /// A metric could not be computed.
    Metric,
    /// Filesystem or serialization failure.
    Io,
}

/// Errors that can occur while cleaning, training, forecasting or analyzing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    /// A locality is required but was not supplied.
    #[error("locality is required")]
    MissingLocality,

    /// The locality does not appear anywhere in the dataset.
    #[error("unknown locality: {0}")]
    UnknownLocality(String),

    /// Network type outside {3G, 4G, 5G, LTE}.
    #[error("invalid network type: {0} (expected one of 3G, 4G, 5G, LTE)")]
    InvalidNetworkType(String),

    /// Forecast horizon must be positive and within the configured maximum.
    #[error("invalid horizon: {0} hours (must be positive and within the configured maximum)")]
    InvalidHorizon(i64),

    /// Date bound could not be parsed or the range is inverted.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// Metric selector not recognized by the analyzer.
    #[error("invalid metric: {0}")]
    InvalidMetric(String),

    /// Demand weights are negative or do not sum to one.
    #[error("invalid demand weights: {0}")]
    InvalidWeights(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No trained model exists for the segment and target.
    #[error("no trained {target} model for segment {locality}/{network_type}")]
    SegmentNotFound {
        locality: String,
        network_type: String,
        target: String,
    },

    /// Scaler used before it was fitted or loaded.
    #[error("scaler not fitted: fit on training data or load a saved scaler first")]
    ScalerNotFitted,

    /// Scaler applied to a feature set of a different shape.
    #[error("scaler shape mismatch: fitted on {expected:?}, got {got:?}")]
    ScalerShapeMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// A training run is already active.
    #[error("training already in progress")]
    TrainingInProgress,

    /// Input dataset has no rows.
    #[error("dataset is empty")]
    EmptyDataset,

    /// No record carries a usable timestamp.
    #[error("dataset has no usable timestamps")]
    MissingTimestamps,

    /// None of the headers map to a known telemetry metric.
    #[error("unrecognized schema: {0}")]
    UnrecognizedSchema(String),

    /// Two raw headers resolve to the same canonical field.
    #[error("ambiguous column: '{first}' and '{second}' both map to {field}")]
    AmbiguousColumn {
        field: String,
        first: String,
        second: String,
    },

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A segment model could not be fitted.
    #[error("training failed for {segment}: {reason}")]
    TrainingFailure { segment: String, reason: String },

    /// Empty or degenerate metric input.
    #[error("metric computation error: {0}")]
    MetricComputation(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(String),

    /// Serialization or CSV parsing failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TelemetryError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use TelemetryError::*;
        match self {
            MissingLocality
            | UnknownLocality(_)
            | InvalidNetworkType(_)
            | InvalidHorizon(_)
            | InvalidDateRange(_)
            | InvalidMetric(_)
            | InvalidWeights(_)
            | InvalidParameter(_) => ErrorKind::Input,
            SegmentNotFound { .. }
            | ScalerNotFitted
            | ScalerShapeMismatch { .. }
            | TrainingInProgress => ErrorKind::State,
            EmptyDataset
            | MissingTimestamps
            | UnrecognizedSchema(_)
            | AmbiguousColumn { .. }
            | InsufficientData { .. }
            | DimensionMismatch { .. } => ErrorKind::Data,
            TrainingFailure { .. } => ErrorKind::Training,
            MetricComputation(_) => ErrorKind::Metric,
            Io(_) | Serialization(_) => ErrorKind::Io,
        }
    }

    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        use TelemetryError::*;
        match self {
            MissingLocality => "MISSING_LOCALITY",
            UnknownLocality(_) => "UNKNOWN_LOCALITY",
            InvalidNetworkType(_) => "INVALID_NETWORK_TYPE",
            InvalidHorizon(_) => "INVALID_HORIZON",
            InvalidDateRange(_) => "INVALID_DATE_RANGE",
            InvalidMetric(_) => "INVALID_METRIC",
            InvalidWeights(_) => "INVALID_WEIGHTS",
            InvalidParameter(_) => "INVALID_PARAMETER",
            SegmentNotFound { .. } => "SEGMENT_NOT_FOUND",
            ScalerNotFitted => "SCALER_NOT_FITTED",
            ScalerShapeMismatch { .. } => "SCALER_SHAPE_MISMATCH",
            TrainingInProgress => "TRAINING_IN_PROGRESS",
            EmptyDataset => "EMPTY_DATASET",
            MissingTimestamps => "MISSING_TIMESTAMPS",
            UnrecognizedSchema(_) => "UNRECOGNIZED_SCHEMA",
            AmbiguousColumn { .. } => "AMBIGUOUS_COLUMN",
            InsufficientData { .. } => "INSUFFICIENT_DATA",
            DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            TrainingFailure { .. } => "TRAINING_FAILURE",
            MetricComputation(_) => "METRIC_ERROR",
            Io(_) => "IO_ERROR",
            Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for TelemetryError {
    fn from(err: csv::Error) -> Self {
        TelemetryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = TelemetryError::EmptyDataset;
        assert_eq!(err.to_string(), "dataset is empty");

        let err = TelemetryError::InsufficientData { needed: 10, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 10, got 5"
        );

        let err = TelemetryError::InvalidHorizon(0);
        assert_eq!(err.to_string(), "invalid horizon: 0 hours (must be positive)");

        let err = TelemetryError::SegmentNotFound {
            locality: "Austin".to_string(),
            network_type: "5G".to_string(),
            target: "throughput".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no trained throughput model for segment Austin/5G"
        );
    }

    #[test]
    fn codes_are_stable_and_distinct() {
        assert_eq!(TelemetryError::TrainingInProgress.code(), "TRAINING_IN_PROGRESS");
        assert_eq!(
            TelemetryError::UnknownLocality("Houston".into()).code(),
            "UNKNOWN_LOCALITY"
        );
        assert_ne!(
            TelemetryError::UnknownLocality("x".into()).code(),
            TelemetryError::SegmentNotFound {
                locality: "x".into(),
                network_type: "5G".into(),
                target: "throughput".into(),
            }
            .code()
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(TelemetryError::InvalidHorizon(-1).kind(), ErrorKind::Input);
        assert_eq!(TelemetryError::ScalerNotFitted.kind(), ErrorKind::State);
        assert_eq!(TelemetryError::TrainingInProgress.kind(), ErrorKind::State);
        assert_eq!(TelemetryError::MissingTimestamps.kind(), ErrorKind::Data);
        assert_eq!(
            TelemetryError::TrainingFailure {
                segment: "a".into(),
                reason: "b".into()
            }
            .kind(),
            ErrorKind::Training
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TelemetryError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = TelemetryError::ScalerNotFitted;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
