//! Accuracy metrics for model evaluation and confidence intervals.

use crate::error::{Result, TelemetryError};
use crate::utils::stats::quantile_normal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Regression quality of a model on held-out data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Absolute Percentage Error over non-zero actuals
    pub mape: f64,
    /// Coefficient of determination
    pub r2: f64,
}

fn validate(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.is_empty() || y_pred.is_empty() {
        return Err(TelemetryError::MetricComputation(
            "metrics need at least one value".into(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(TelemetryError::MetricComputation(format!(
            "length mismatch: {} actual vs {} predicted",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.iter().chain(y_pred).any(|v| !v.is_finite()) {
        return Err(TelemetryError::MetricComputation(
            "non-finite value in metric input".into(),
        ));
    }
    Ok(())
}

/// Root mean squared error.
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    validate(y_true, y_pred)?;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute error.
pub fn mae(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    validate(y_true, y_pred)?;
    Ok(y_true
        .iter()
        .zip(y_pred)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / y_true.len() as f64)
}

/// Mean absolute percentage error, in percent.
///
/// Only indices with a non-zero actual contribute. When every actual is
/// zero the result is exactly `0.0`.
pub fn mape(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    validate(y_true, y_pred)?;
    let (sum, count) = y_true
        .iter()
        .zip(y_pred)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(s, c), (a, p)| (s + ((a - p) / a).abs(), c + 1));
    if count == 0 {
        return Ok(0.0);
    }
    Ok(100.0 * sum / count as f64)
}

/// Coefficient of determination.
///
/// With a constant `y_true` the ratio is undefined; a perfect prediction
/// scores 1.0 and anything else 0.0.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    validate(y_true, y_pred)?;
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Calculate all regression metrics between actual and predicted values.
pub fn regression_metrics(y_true: &[f64], y_pred: &[f64]) -> Result<RegressionMetrics> {
    Ok(RegressionMetrics {
        rmse: rmse(y_true, y_pred)?,
        mae: mae(y_true, y_pred)?,
        mape: mape(y_true, y_pred)?,
        r2: r2(y_true, y_pred)?,
    })
}

/// Two-sided normal confidence bounds around point predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub level: f64,
    pub z: f64,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Bounds `prediction ∓ z·std` with `z = Φ⁻¹((1 + level) / 2)`.
///
/// # Example
/// ```
/// use cellcast::utils::confidence_interval;
///
/// let ci = confidence_interval(&[10.0], &[1.0], 0.95).unwrap();
/// assert!((ci.lower[0] - 8.04).abs() < 0.01);
/// assert!((ci.upper[0] - 11.96).abs() < 0.01);
/// ```
pub fn confidence_interval(
    predictions: &[f64],
    std: &[f64],
    level: f64,
) -> Result<ConfidenceInterval> {
    if !(level > 0.0 && level < 1.0) {
        return Err(TelemetryError::InvalidParameter(format!(
            "confidence level must be in (0, 1), got {}",
            level
        )));
    }
    if predictions.len() != std.len() {
        return Err(TelemetryError::DimensionMismatch {
            expected: predictions.len(),
            got: std.len(),
        });
    }
    if std.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(TelemetryError::InvalidParameter(
            "standard deviations must be finite and non-negative".into(),
        ));
    }

    let z = quantile_normal((1.0 + level) / 2.0);
    let (lower, upper) = predictions
        .iter()
        .zip(std)
        .map(|(p, s)| (p - z * s, p + z * s))
        .unzip();

    Ok(ConfidenceInterval {
        level,
        z,
        lower,
        upper,
    })
}

/// Signal-strength thresholds separating quality bands, in dBm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// At or above this is [`SignalBand::Good`].
    pub good: f64,
    /// At or above this (and below `good`) is [`SignalBand::Fair`].
    pub fair: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            good: -70.0,
            fair: -90.0,
        }
    }
}

/// Coarse signal quality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalBand {
    Good,
    Fair,
    Poor,
}

impl SignalBand {
    pub fn classify(dbm: f64, thresholds: &SignalThresholds) -> Self {
        if dbm >= thresholds.good {
            SignalBand::Good
        } else if dbm >= thresholds.fair {
            SignalBand::Fair
        } else {
            SignalBand::Poor
        }
    }
}

impl fmt::Display for SignalBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalBand::Good => "good",
            SignalBand::Fair => "fair",
            SignalBand::Poor => "poor",
        })
    }
}

/// Multi-class classification quality.
///
/// Precision, recall and F1 are support-weighted averages over labels;
/// a label with no predictions (or no support) contributes 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Sorted labels indexing the confusion matrix.
    pub labels: Vec<String>,
    /// `confusion_matrix[actual][predicted]`.
    pub confusion_matrix: Vec<Vec<usize>>,
}

/// Calculate classification metrics between actual and predicted labels.
pub fn classification_metrics<L>(y_true: &[L], y_pred: &[L]) -> Result<ClassificationMetrics>
where
    L: Ord + Clone + fmt::Display,
{
    if y_true.is_empty() {
        return Err(TelemetryError::MetricComputation(
            "metrics need at least one value".into(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(TelemetryError::MetricComputation(format!(
            "length mismatch: {} actual vs {} predicted",
            y_true.len(),
            y_pred.len()
        )));
    }

    let index: BTreeMap<&L, usize> = y_true
        .iter()
        .chain(y_pred)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, l)| (l, i))
        .collect();
    let k = index.len();

    let mut cm = vec![vec![0usize; k]; k];
    for (a, p) in y_true.iter().zip(y_pred) {
        cm[index[a]][index[p]] += 1;
    }

    let n = y_true.len() as f64;
    let mut correct = 0usize;
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for i in 0..k {
        let tp = cm[i][i];
        let support: usize = cm[i].iter().sum();
        let predicted: usize = cm.iter().map(|row| row[i]).sum();
        correct += tp;

        let p = if predicted == 0 { 0.0 } else { tp as f64 / predicted as f64 };
        let r = if support == 0 { 0.0 } else { tp as f64 / support as f64 };
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
        let weight = support as f64 / n;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    Ok(ClassificationMetrics {
        accuracy: correct as f64 / n,
        precision,
        recall,
        f1,
        labels: index.keys().map(|l| l.to_string()).collect(),
        confusion_matrix: cm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_prediction() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let m = regression_metrics(&y, &y).unwrap();
        assert_relative_eq!(m.rmse, 0.0);
        assert_relative_eq!(m.mae, 0.0);
        assert_relative_eq!(m.mape, 0.0);
        assert_relative_eq!(m.r2, 1.0);
    }

    #[test]
    fn known_errors() {
        let actual = vec![2.0, 4.0, 6.0, 8.0];
        let predicted = vec![3.0, 4.0, 5.0, 10.0];
        assert_relative_eq!(mae(&actual, &predicted).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(rmse(&actual, &predicted).unwrap(), 1.5_f64.sqrt(), epsilon = 1e-12);
        // (50% + 0 + 16.67% + 25%) / 4
        assert_relative_eq!(
            mape(&actual, &predicted).unwrap(),
            (50.0 + 0.0 + 100.0 / 6.0 + 25.0) / 4.0,
            epsilon = 1e-9
        );
        // ss_res = 1 + 0 + 1 + 4 = 6, ss_tot = 20
        assert_relative_eq!(r2(&actual, &predicted).unwrap(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn mape_all_zero_actuals_is_zero() {
        assert_eq!(mape(&[0.0, 0.0, 0.0], &[1.0, -2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn mape_skips_zero_actuals() {
        assert_relative_eq!(mape(&[0.0, 10.0], &[5.0, 11.0]).unwrap(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn r2_constant_actuals() {
        assert_eq!(r2(&[3.0, 3.0], &[3.0, 3.0]).unwrap(), 1.0);
        assert_eq!(r2(&[3.0, 3.0], &[2.0, 4.0]).unwrap(), 0.0);
    }

    #[test]
    fn invalid_inputs_are_metric_errors() {
        assert_eq!(rmse(&[], &[]).unwrap_err().code(), "METRIC_ERROR");
        assert_eq!(mae(&[1.0], &[1.0, 2.0]).unwrap_err().code(), "METRIC_ERROR");
        assert_eq!(r2(&[1.0, f64::NAN], &[1.0, 2.0]).unwrap_err().code(), "METRIC_ERROR");
    }

    #[test]
    fn confidence_interval_95() {
        let ci = confidence_interval(&[10.0], &[1.0], 0.95).unwrap();
        assert_relative_eq!(ci.z, 1.959964, epsilon = 1e-5);
        assert_relative_eq!(ci.lower[0], 8.04, epsilon = 0.01);
        assert_relative_eq!(ci.upper[0], 11.96, epsilon = 0.01);
    }

    #[test]
    fn confidence_interval_validation() {
        assert!(confidence_interval(&[1.0], &[1.0], 1.0).is_err());
        assert!(confidence_interval(&[1.0], &[1.0], 0.0).is_err());
        assert!(confidence_interval(&[1.0, 2.0], &[1.0], 0.9).is_err());
        assert!(confidence_interval(&[1.0], &[-1.0], 0.9).is_err());
        let zero = confidence_interval(&[5.0], &[0.0], 0.9).unwrap();
        assert_eq!(zero.lower, zero.upper);
    }

    #[test]
    fn signal_bands() {
        let t = SignalThresholds::default();
        assert_eq!(SignalBand::classify(-70.0, &t), SignalBand::Good);
        assert_eq!(SignalBand::classify(-70.1, &t), SignalBand::Fair);
        assert_eq!(SignalBand::classify(-90.0, &t), SignalBand::Fair);
        assert_eq!(SignalBand::classify(-95.0, &t), SignalBand::Poor);
    }

    #[test]
    fn weighted_classification_metrics() {
        use SignalBand::*;
        let actual = [Good, Good, Fair, Poor];
        let predicted = [Good, Fair, Fair, Poor];
        let m = classification_metrics(&actual, &predicted).unwrap();

        assert_relative_eq!(m.accuracy, 0.75);
        assert_relative_eq!(m.precision, 0.875, epsilon = 1e-12);
        assert_relative_eq!(m.recall, 0.75, epsilon = 1e-12);
        assert_relative_eq!(m.f1, 0.75, epsilon = 1e-12);
        assert_eq!(m.labels, vec!["good", "fair", "poor"]);
        assert_eq!(m.confusion_matrix, vec![vec![1, 1, 0], vec![0, 1, 0], vec![0, 0, 1]]);
    }

    #[test]
    fn unseen_predicted_label_has_zero_weight() {
        let m = classification_metrics(&["a", "a"], &["a", "b"]).unwrap();
        assert_eq!(m.labels, vec!["a", "b"]);
        assert_relative_eq!(m.recall, 0.5);
        assert_relative_eq!(m.precision, 1.0);
    }
}
