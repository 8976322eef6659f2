//! Regressor trait defining the common interface for segment models.

use crate::error::Result;
use crate::preprocess::FeatureMatrix;
use std::fmt::Debug;

/// Common interface for feature-based regressors.
///
/// This trait is object-safe and can be used with `Box<dyn Regressor>`.
pub trait Regressor: Debug + Send + Sync {
    /// Fit the model to a feature matrix and target values.
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Predict a single row laid out like the training columns.
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    /// Standard deviation of a single prediction, when the model has one.
    fn prediction_std(&self) -> Option<f64> {
        None
    }

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool;
}

/// Type alias for boxed regressor trait objects.
///
/// # Example
///
/// ```
/// use cellcast::models::{BoxedRegressor, LinearRegressor, Regressor};
///
/// let model: BoxedRegressor = Box::new(LinearRegressor::new(1e-3));
/// assert_eq!(model.name(), "Ridge");
/// assert!(!model.is_fitted());
/// ```
pub type BoxedRegressor = Box<dyn Regressor>;
