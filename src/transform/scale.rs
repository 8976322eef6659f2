//! Feature scaling.
//!
//! [`StandardScaler`] standardizes named feature columns and is persisted
//! alongside the models trained on it. [`normalize`] provides min-max
//! scaling for ranking metrics.

use crate::error::{Result, TelemetryError};
use crate::preprocess::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Scales below this are treated as zero.
const SCALE_EPSILON: f64 = 1e-10;

/// Normalize data to [0, 1] range (min-max normalization).
///
/// x_scaled = (x - min) / (max - min)
///
/// A constant series maps to all zeros.
pub fn normalize(series: &[f64]) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }

    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let scale = if range < SCALE_EPSILON { 1.0 } else { range };
    series.iter().map(|&x| (x - min) / scale).collect()
}

/// Per-column z-score scaler fitted on a training partition.
///
/// Uses the population standard deviation. Zero-variance columns get a
/// scale of 1 so they map to 0 instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the named columns of `matrix`.
    pub fn fit(matrix: &FeatureMatrix, columns: &[&str]) -> Result<Self> {
        if matrix.n_rows() == 0 {
            return Err(TelemetryError::InsufficientData { needed: 1, got: 0 });
        }

        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for name in columns {
            let values = matrix.column(name).ok_or_else(|| {
                TelemetryError::InvalidParameter(format!("unknown feature column '{}'", name))
            })?;
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            means.push(mean);
            scales.push(if std < SCALE_EPSILON { 1.0 } else { std });
        }

        Ok(Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            means,
            scales,
        })
    }

    /// Fitted column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Check that `columns` names exactly the fitted columns.
    pub fn check_columns(&self, columns: &[&str]) -> Result<()> {
        if columns.len() != self.columns.len()
            || columns.iter().zip(&self.columns).any(|(a, b)| a != b)
        {
            return Err(TelemetryError::ScalerShapeMismatch {
                expected: self.columns.clone(),
                got: columns.iter().map(|c| c.to_string()).collect(),
            });
        }
        Ok(())
    }

    /// Scale the fitted columns of `matrix`, leaving other columns as-is.
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        let mut out = matrix.clone();
        for (i, name) in self.columns.iter().enumerate() {
            let idx = matrix.position(name).ok_or_else(|| TelemetryError::ScalerShapeMismatch {
                expected: self.columns.clone(),
                got: matrix.names().to_vec(),
            })?;
            let (mean, scale) = (self.means[i], self.scales[i]);
            for v in out.column_mut(idx).iter_mut() {
                *v = (*v - mean) / scale;
            }
        }
        Ok(out)
    }

    /// Scale a single row laid out exactly as the fitted columns.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.columns.len() {
            return Err(TelemetryError::DimensionMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }
}
