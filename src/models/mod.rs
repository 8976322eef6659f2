//! Segment models: the regressor, trained model records, the shared store
//! and the training run that fills it.

mod traits;

pub mod linear;
pub mod store;
pub mod trained;
pub mod trainer;

pub use linear::LinearRegressor;
pub use store::{
    ModelMetrics, SegmentMap, SegmentMetrics, SegmentModelStore, SegmentModels, MODELS_DIR,
    SCALER_FILE,
};
pub use trained::{PersistedModel, TrainedModel};
pub use trainer::{
    FailedSegment, SkippedSegment, TrainedSummary, Trainer, TrainingOutcome, TrainingReport,
};
pub use traits::{BoxedRegressor, Regressor};
