//! Ridge-regularized linear regressor.
//!
//! Zero-variance feature columns are dropped before fitting (their
//! coefficient is fixed at zero), which keeps calendar features that are
//! constant within a short segment history from making the system singular.

use crate::error::{Result, TelemetryError};
use crate::models::Regressor;
use crate::preprocess::FeatureMatrix;
use crate::utils::{ols_fit, OLSResult};
use serde::{Deserialize, Serialize};

const VARIANCE_EPSILON: f64 = 1e-12;

/// Linear model with an L2 penalty and a residual noise estimate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegressor {
    alpha: f64,
    columns: Vec<String>,
    fit: Option<OLSResult>,
    residual_std: Option<f64>,
}

impl LinearRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Default::default()
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Feature column names seen at fit time.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coefficients.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearRegressor {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        let n = y.len();
        if n < 2 {
            return Err(TelemetryError::InsufficientData { needed: 2, got: n });
        }
        if x.n_rows() != n {
            return Err(TelemetryError::DimensionMismatch {
                expected: n,
                got: x.n_rows(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(TelemetryError::InvalidParameter(
                "target contains non-finite values".into(),
            ));
        }

        // Fit only on columns that vary
        let active: Vec<usize> = x
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let mean = c.iter().sum::<f64>() / n as f64;
                c.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64 > VARIANCE_EPSILON
            })
            .map(|(i, _)| i)
            .collect();
        let active_cols: Vec<&[f64]> = active.iter().map(|&i| x.columns()[i].as_slice()).collect();
        let reduced = ols_fit(y, &active_cols, self.alpha)?;

        let mut coefficients = vec![0.0; x.n_cols()];
        for (&i, b) in active.iter().zip(&reduced.coefficients) {
            coefficients[i] = *b;
        }
        let fit = OLSResult {
            coefficients,
            intercept: reduced.intercept,
        };

        let all_cols: Vec<&[f64]> = x.columns().iter().map(|c| c.as_slice()).collect();
        let fitted = fit.predict(&all_cols)?;
        let sse: f64 = y.iter().zip(&fitted).map(|(a, f)| (a - f).powi(2)).sum();
        let dof = n.saturating_sub(active.len() + 1).max(1);

        self.columns = x.names().to_vec();
        self.residual_std = Some((sse / dof as f64).sqrt());
        self.fit = Some(fit);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let fit = self.fit.as_ref().ok_or_else(not_fitted)?;
        if x.names() != self.columns.as_slice() {
            return Err(TelemetryError::ScalerShapeMismatch {
                expected: self.columns.clone(),
                got: x.names().to_vec(),
            });
        }
        let cols: Vec<&[f64]> = x.columns().iter().map(|c| c.as_slice()).collect();
        fit.predict(&cols)
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        self.fit.as_ref().ok_or_else(not_fitted)?.predict_row(row)
    }

    fn prediction_std(&self) -> Option<f64> {
        self.residual_std
    }

    fn name(&self) -> &str {
        "Ridge"
    }

    fn is_fitted(&self) -> bool {
        self.fit.is_some()
    }
}

fn not_fitted() -> TelemetryError {
    TelemetryError::InvalidParameter("regressor has not been fitted".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix(rows: &[Vec<f64>]) -> FeatureMatrix {
        FeatureMatrix::from_rows(vec!["x".into(), "c".into()], rows).unwrap()
    }

    #[test]
    fn recovers_linear_relationship() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 3.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| 1.0 + 2.0 * i as f64).collect();

        let mut model = LinearRegressor::new(0.0);
        model.fit(&matrix(&rows), &y).unwrap();

        assert!(model.is_fitted());
        let coef = model.coefficients().unwrap();
        assert_relative_eq!(coef[0], 2.0, epsilon = 1e-6);
        // constant column is dropped
        assert_eq!(coef[1], 0.0);
        assert_relative_eq!(model.predict_row(&[20.0, 3.0]).unwrap(), 41.0, epsilon = 1e-5);
        assert_relative_eq!(model.prediction_std().unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn residual_std_reflects_noise() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, 0.0]).collect();
        let y = vec![0.0, 3.0, 2.0, 5.0, 4.0, 7.0, 6.0, 9.0];
        let mut model = LinearRegressor::new(0.0);
        model.fit(&matrix(&rows), &y).unwrap();

        let predicted = model.predict(&matrix(&rows)).unwrap();
        let sse: f64 = y.iter().zip(&predicted).map(|(a, p)| (a - p).powi(2)).sum();
        // one slope plus the intercept
        assert_relative_eq!(model.prediction_std().unwrap(), (sse / 6.0).sqrt(), epsilon = 1e-9);
        assert!(model.prediction_std().unwrap() > 0.5);
    }

    #[test]
    fn unfitted_and_short_inputs() {
        let model = LinearRegressor::new(1e-3);
        assert!(model.predict_row(&[1.0, 2.0]).is_err());
        assert!(!model.is_fitted());

        let mut model = LinearRegressor::new(1e-3);
        let err = model.fit(&matrix(&[vec![1.0, 1.0]]), &[1.0]).unwrap_err();
        assert_eq!(err, TelemetryError::InsufficientData { needed: 2, got: 1 });
    }

    #[test]
    fn predict_checks_columns() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64, i as f64 * 2.0]).collect();
        let mut model = LinearRegressor::new(1e-3);
        model.fit(&matrix(&rows), &[0.0, 1.0, 2.0, 3.0]).unwrap();

        let other = FeatureMatrix::from_rows(vec!["a".into(), "b".into()], &rows).unwrap();
        assert!(model.predict(&other).is_err());
        assert_eq!(model.predict(&matrix(&rows)).unwrap().len(), 4);
    }

    #[test]
    fn survives_serialization() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, 1.0]).collect();
        let mut model = LinearRegressor::new(1e-3);
        model.fit(&matrix(&rows), &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let back: LinearRegressor = serde_json::from_str(&json).unwrap();
        assert!(back.is_fitted());
        assert_eq!(back.predict_row(&[2.0, 1.0]).unwrap(), model.predict_row(&[2.0, 1.0]).unwrap());
        assert_eq!(back.prediction_std(), model.prediction_std());
    }
}
