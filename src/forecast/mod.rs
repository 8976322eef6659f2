//! Segment forecasts over a horizon.
//!
//! A [`Forecaster`] works on snapshots: the dataset it anchors and
//! conditions on, and the model map it predicts with. Neither changes while
//! a forecast is being computed.

mod forecaster;
mod result;

pub use forecaster::Forecaster;
pub use result::{Forecast, ForecastPoint, SegmentForecast};
