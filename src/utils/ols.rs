//! Regularized least squares regression.
//!
//! Fits `y = intercept + X @ coefficients` on centered data by solving the
//! ridge normal equations `(X'X + αI) β = X'y` with a Cholesky decomposition.
//! The intercept is not penalized.

use crate::error::{Result, TelemetryError};
use serde::{Deserialize, Serialize};

/// Jitter added to the diagonal for numerical stability.
const DIAGONAL_JITTER: f64 = 1e-8;

/// Least squares coefficients and intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OLSResult {
    /// Regression coefficients (one per regressor column).
    pub coefficients: Vec<f64>,
    /// Intercept term.
    pub intercept: f64,
}

impl OLSResult {
    /// Predict a single observation.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(TelemetryError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: row.len(),
            });
        }
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>())
    }

    /// Predict every observation of column-major regressors.
    pub fn predict(&self, columns: &[&[f64]]) -> Result<Vec<f64>> {
        if columns.len() != self.coefficients.len() {
            return Err(TelemetryError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: columns.len(),
            });
        }
        let n = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut predictions = vec![self.intercept; n];
        for (coef, values) in self.coefficients.iter().zip(columns) {
            if values.len() != n {
                return Err(TelemetryError::DimensionMismatch {
                    expected: n,
                    got: values.len(),
                });
            }
            for (pred, x) in predictions.iter_mut().zip(values.iter()) {
                *pred += coef * x;
            }
        }
        Ok(predictions)
    }

    /// Get the number of regressors.
    pub fn num_regressors(&self) -> usize {
        self.coefficients.len()
    }
}

/// Fit ridge regression on column-major regressors.
///
/// # Arguments
/// * `y` - Target values (length n)
/// * `columns` - Regressor columns (each length n)
/// * `alpha` - Non-negative L2 penalty on the coefficients
pub fn ols_fit(y: &[f64], columns: &[&[f64]], alpha: f64) -> Result<OLSResult> {
    let n = y.len();
    if n == 0 {
        return Err(TelemetryError::InsufficientData { needed: 1, got: 0 });
    }
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(TelemetryError::InvalidParameter(format!(
            "ridge penalty must be finite and non-negative, got {}",
            alpha
        )));
    }
    for values in columns {
        if values.len() != n {
            return Err(TelemetryError::DimensionMismatch {
                expected: n,
                got: values.len(),
            });
        }
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    if columns.is_empty() {
        return Ok(OLSResult {
            coefficients: vec![],
            intercept: y_mean,
        });
    }

    let k = columns.len();
    let x_means: Vec<f64> = columns
        .iter()
        .map(|c| c.iter().sum::<f64>() / n as f64)
        .collect();

    // Centered normal equations
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for obs in 0..n {
        let yc = y[obs] - y_mean;
        for i in 0..k {
            let xi = columns[i][obs] - x_means[i];
            xty[i] += xi * yc;
            for j in 0..=i {
                xtx[i][j] += xi * (columns[j][obs] - x_means[j]);
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        xtx[i][i] += alpha + DIAGONAL_JITTER;
    }

    let coefficients = solve_symmetric(&xtx, &xty).ok_or_else(|| {
        TelemetryError::InvalidParameter(
            "least squares failed: matrix not positive definite".into(),
        )
    })?;

    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_means)
            .map(|(b, m)| b * m)
            .sum::<f64>();

    Ok(OLSResult {
        coefficients,
        intercept,
    })
}

/// Solve symmetric positive definite system using Cholesky decomposition.
///
/// Solves A @ x = b where A is symmetric positive definite.
fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    // Cholesky decomposition A = L @ L'
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L @ y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // Backward substitution: L' @ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ols_fit_simple_linear() {
        // y = 2 + 3*x
        let y = vec![5.0, 8.0, 11.0, 14.0, 17.0];
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        let result = ols_fit(&y, &[&x[..]], 0.0).unwrap();

        assert_relative_eq!(result.intercept, 2.0, epsilon = 1e-6);
        assert_eq!(result.num_regressors(), 1);
        assert_relative_eq!(result.coefficients[0], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn ols_fit_multiple_regressors() {
        // y = 1 + 2*x1 + 3*x2
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x2 = vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.0 + 2.0 * a + 3.0 * b)
            .collect();

        let result = ols_fit(&y, &[&x1[..], &x2[..]], 0.0).unwrap();
        assert_relative_eq!(result.intercept, 1.0, epsilon = 1e-5);
        assert_relative_eq!(result.coefficients[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(result.coefficients[1], 3.0, epsilon = 1e-5);

        let fitted = result.predict(&[&x1[..], &x2[..]]).unwrap();
        for (f, t) in fitted.iter().zip(&y) {
            assert_relative_eq!(f, t, epsilon = 1e-5);
        }
    }

    #[test]
    fn ridge_handles_collinear_and_constant_columns() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let dup = x.clone();
        let constant = vec![7.0; 4];
        let y = vec![2.0, 4.0, 6.0, 8.0];

        let result = ols_fit(&y, &[&x[..], &dup[..], &constant[..]], 1e-3).unwrap();
        // collinear weight is shared, the constant column gets none
        assert_relative_eq!(result.coefficients[0], result.coefficients[1], epsilon = 1e-9);
        assert_relative_eq!(result.coefficients[2], 0.0, epsilon = 1e-9);
        let pred = result.predict_row(&[2.5, 2.5, 7.0]).unwrap();
        assert_relative_eq!(pred, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let plain = ols_fit(&y, &[&x[..]], 0.0).unwrap();
        let ridge = ols_fit(&y, &[&x[..]], 10.0).unwrap();
        assert!(ridge.coefficients[0].abs() < plain.coefficients[0].abs());
    }

    #[test]
    fn no_regressors_gives_mean() {
        let result = ols_fit(&[1.0, 2.0, 3.0], &[], 0.0).unwrap();
        assert_relative_eq!(result.intercept, 2.0);
        assert!(result.coefficients.is_empty());
    }

    #[test]
    fn invalid_inputs() {
        assert!(ols_fit(&[], &[], 0.0).is_err());
        assert!(ols_fit(&[1.0, 2.0], &[&[1.0][..]], 0.0).is_err());
        assert!(ols_fit(&[1.0], &[&[1.0][..]], -1.0).is_err());
        let fit = ols_fit(&[1.0, 2.0], &[&[1.0, 2.0][..]], 0.0).unwrap();
        assert!(fit.predict_row(&[1.0, 2.0]).is_err());
    }
}
