//! Model feature columns and column-major feature matrices.

use crate::core::TelemetryRecord;
use crate::error::{Result, TelemetryError};
use crate::preprocess::temporal::DerivedFeatures;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A numeric model input derived from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    HourOfDay,
    DayOfWeek,
    DayOfMonth,
    Month,
    IsWeekend,
    TimeOfDayEncoded,
    /// Hours since the Unix epoch; carries the trend.
    EpochHours,
    Latitude,
    Longitude,
}

impl FeatureColumn {
    /// Features computable from the timestamp alone.
    pub const TEMPORAL: [FeatureColumn; 7] = [
        FeatureColumn::HourOfDay,
        FeatureColumn::DayOfWeek,
        FeatureColumn::DayOfMonth,
        FeatureColumn::Month,
        FeatureColumn::IsWeekend,
        FeatureColumn::TimeOfDayEncoded,
        FeatureColumn::EpochHours,
    ];

    pub const SPATIAL: [FeatureColumn; 2] = [FeatureColumn::Latitude, FeatureColumn::Longitude];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::HourOfDay => "hour_of_day",
            FeatureColumn::DayOfWeek => "day_of_week",
            FeatureColumn::DayOfMonth => "day_of_month",
            FeatureColumn::Month => "month",
            FeatureColumn::IsWeekend => "is_weekend",
            FeatureColumn::TimeOfDayEncoded => "time_of_day_encoded",
            FeatureColumn::EpochHours => "epoch_hours",
            FeatureColumn::Latitude => "latitude",
            FeatureColumn::Longitude => "longitude",
        }
    }

    /// Value of this feature at a timestamp and location.
    pub fn value(
        &self,
        timestamp: &DateTime<Utc>,
        features: &DerivedFeatures,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Option<f64> {
        match self {
            FeatureColumn::HourOfDay => Some(features.hour_of_day as f64),
            FeatureColumn::DayOfWeek => Some(features.day_of_week as f64),
            FeatureColumn::DayOfMonth => Some(features.day_of_month as f64),
            FeatureColumn::Month => Some(features.month as f64),
            FeatureColumn::IsWeekend => Some(if features.is_weekend { 1.0 } else { 0.0 }),
            FeatureColumn::TimeOfDayEncoded => Some(features.time_of_day_encoded as f64),
            FeatureColumn::EpochHours => Some(timestamp.timestamp() as f64 / 3600.0),
            FeatureColumn::Latitude => latitude,
            FeatureColumn::Longitude => longitude,
        }
    }
}

/// Names of a feature column list, in order.
pub fn column_names(columns: &[FeatureColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Build one feature row for a timestamp and location.
///
/// Returns `None` if a requested spatial value is missing.
pub fn feature_row(
    timestamp: &DateTime<Utc>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    columns: &[FeatureColumn],
) -> Option<Vec<f64>> {
    let features = DerivedFeatures::from_timestamp(timestamp);
    columns
        .iter()
        .map(|c| c.value(timestamp, &features, latitude, longitude))
        .collect()
}

/// Column-major numeric matrix with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    names: Vec<String>,
    /// data[column][row]
    data: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Create a matrix from named columns of equal length.
    pub fn new(names: Vec<String>, data: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != data.len() {
            return Err(TelemetryError::DimensionMismatch {
                expected: names.len(),
                got: data.len(),
            });
        }
        let rows = data.first().map(|c| c.len()).unwrap_or(0);
        for column in &data {
            if column.len() != rows {
                return Err(TelemetryError::DimensionMismatch {
                    expected: rows,
                    got: column.len(),
                });
            }
        }
        Ok(Self { names, data })
    }

    /// Build from rows, each with one value per column.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let mut data = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in rows {
            if row.len() != names.len() {
                return Err(TelemetryError::DimensionMismatch {
                    expected: names.len(),
                    got: row.len(),
                });
            }
            for (col, v) in data.iter_mut().zip(row) {
                col.push(*v);
            }
        }
        Self::new(names, data)
    }

    /// Build the feature matrix for a set of records.
    ///
    /// Every record must have a timestamp and, when requested, coordinates.
    pub fn from_records(records: &[&TelemetryRecord], columns: &[FeatureColumn]) -> Result<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let ts = record.timestamp.ok_or(TelemetryError::MissingTimestamps)?;
            let row = feature_row(&ts, record.latitude, record.longitude, columns).ok_or_else(|| {
                TelemetryError::InvalidParameter(format!(
                    "record for {} lacks coordinates required by the feature set",
                    record.locality
                ))
            })?;
            rows.push(row);
        }
        Self::from_rows(column_names(columns), &rows)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.data.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| self.data[i].as_slice())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> &mut Vec<f64> {
        &mut self.data[index]
    }

    /// Copy out one row.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.data.iter().map(|c| c[index]).collect()
    }

    /// Keep the rows selected by `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            data: self
                .data
                .iter()
                .map(|c| indices.iter().map(|&i| c[i]).collect())
                .collect(),
        }
    }
}
