//! Preprocessing: cleaning, temporal features, splitting and feature scaling.
//!
//! # Example
//!
//! ```
//! use cellcast::core::RawTable;
//! use cellcast::preprocess::Preprocessor;
//!
//! let raw = RawTable::from_rows(
//!     &["Timestamp", "Locality", "Network Type", "Latency (ms)"],
//!     &[
//!         vec!["2024-01-01 08:00:00", "Austin", "5G", "20"],
//!         vec!["2024-01-01 09:00:00", "Austin", "5G", "22"],
//!     ],
//! );
//! let table = Preprocessor::default().clean(&raw).unwrap();
//! assert_eq!(table.records()[0].features.unwrap().hour_of_day, 8);
//! ```

pub mod clean;
pub mod features;
pub mod schema;
pub mod split;
pub mod temporal;

pub use clean::{clean_table, fill_gaps, CleaningReport};
pub use features::{column_names, feature_row, FeatureColumn, FeatureMatrix};
pub use schema::{normalize_header, resolve_header, CanonicalField, SchemaMapping};
pub use split::{split_index, temporal_split};
pub use temporal::{parse_timestamp, DerivedFeatures, TimeOfDay};

use crate::config::PreprocessConfig;
use crate::core::{RawTable, TelemetryTable};
use crate::error::{Result, TelemetryError};
use crate::transform::StandardScaler;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Attach [`DerivedFeatures`] to every record with a timestamp.
///
/// A table without timestamps is returned unchanged.
pub fn derive_temporal_features(mut table: TelemetryTable) -> TelemetryTable {
    if !table.has_timestamps() {
        debug!("no timestamps present; skipping temporal features");
        return table;
    }
    for record in table.records_mut() {
        record.features = record.timestamp.as_ref().map(DerivedFeatures::from_timestamp);
    }
    table
}

/// Cleans raw telemetry and owns the fitted feature scaler.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
    scaler: Option<Arc<StandardScaler>>,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            config,
            scaler: None,
        }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Clean a raw table and derive temporal features.
    pub fn clean(&self, raw: &RawTable) -> Result<TelemetryTable> {
        self.clean_with_report(raw).map(|(table, _)| table)
    }

    /// As [`clean`](Self::clean), also returning what was repaired.
    pub fn clean_with_report(&self, raw: &RawTable) -> Result<(TelemetryTable, CleaningReport)> {
        let (table, report) = clean_table(raw)?;
        Ok((derive_temporal_features(table), report))
    }

    /// Split a table chronologically with the configured test fraction.
    pub fn split(&self, table: &TelemetryTable) -> Result<(TelemetryTable, TelemetryTable)> {
        self.split_with(table, self.config.test_fraction)
    }

    /// Split a table chronologically with an explicit test fraction.
    pub fn split_with(
        &self,
        table: &TelemetryTable,
        test_fraction: f64,
    ) -> Result<(TelemetryTable, TelemetryTable)> {
        let (train, test) = temporal_split(table.records().to_vec(), test_fraction)?;
        Ok((table.with_records(train), table.with_records(test)))
    }

    /// Fit a scaler on training features and scale them.
    ///
    /// Must only be called with training rows.
    pub fn fit_scale(
        &mut self,
        matrix: &FeatureMatrix,
        columns: &[&str],
    ) -> Result<(FeatureMatrix, Arc<StandardScaler>)> {
        let scaler = Arc::new(StandardScaler::fit(matrix, columns)?);
        let scaled = scaler.transform(matrix)?;
        debug!(columns = ?columns, rows = matrix.n_rows(), "fitted feature scaler");
        self.scaler = Some(Arc::clone(&scaler));
        Ok((scaled, scaler))
    }

    /// Scale features with the previously fitted scaler.
    pub fn apply_scale(&self, matrix: &FeatureMatrix, columns: &[&str]) -> Result<FeatureMatrix> {
        let scaler = self.scaler.as_ref().ok_or(TelemetryError::ScalerNotFitted)?;
        scaler.check_columns(columns)?;
        scaler.transform(matrix)
    }

    pub fn scaler(&self) -> Option<&Arc<StandardScaler>> {
        self.scaler.as_ref()
    }

    pub fn set_scaler(&mut self, scaler: Arc<StandardScaler>) {
        self.scaler = Some(scaler);
    }

    /// Write the fitted scaler as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let scaler = self.scaler.as_ref().ok_or(TelemetryError::ScalerNotFitted)?;
        save_scaler(scaler, path)
    }

    /// Restore a persisted scaler into this preprocessor.
    ///
    /// Returns `false` when no artifact exists.
    pub fn load_into(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        match load_scaler(path)? {
            Some(scaler) => {
                self.scaler = Some(Arc::new(scaler));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Write a scaler artifact, creating parent directories.
pub fn save_scaler(scaler: &StandardScaler, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(scaler)?;
    fs::write(path, json)?;
    info!(path = %path.display(), "saved scaler");
    Ok(())
}

/// Read a scaler artifact; an absent file is `Ok(None)`.
pub fn load_scaler(path: impl AsRef<Path>) -> Result<Option<StandardScaler>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NetworkType, TelemetryRecord};
    use chrono::{Duration, TimeZone, Utc};

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec!["x".into(), "y".into()],
            &[vec![1.0, 5.0], vec![2.0, 6.0], vec![3.0, 9.0]],
        )
        .unwrap()
    }

    #[test]
    fn apply_before_fit_fails() {
        let p = Preprocessor::default();
        let err = p.apply_scale(&matrix(), &["x"]).unwrap_err();
        assert_eq!(err, TelemetryError::ScalerNotFitted);
        assert_eq!(p.save("unused.json").unwrap_err(), TelemetryError::ScalerNotFitted);
    }

    #[test]
    fn apply_after_fit_matches_fit_output() {
        let mut p = Preprocessor::default();
        let (scaled, _) = p.fit_scale(&matrix(), &["x", "y"]).unwrap();
        let applied = p.apply_scale(&matrix(), &["x", "y"]).unwrap();
        assert_eq!(scaled, applied);
        assert!(p.apply_scale(&matrix(), &["x"]).is_err());
    }

    #[test]
    fn scaler_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scaler.json");

        let mut p = Preprocessor::default();
        assert!(!p.load_into(&path).unwrap());
        assert_eq!(load_scaler(&path).unwrap(), None);

        p.fit_scale(&matrix(), &["x"]).unwrap();
        p.save(&path).unwrap();

        let mut restored = Preprocessor::default();
        assert!(restored.load_into(&path).unwrap());
        assert_eq!(restored.scaler(), p.scaler());
    }

    #[test]
    fn derives_features_for_timestamped_rows() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap();
        let table = TelemetryTable::from_records(vec![
            TelemetryRecord::new("A", Some(NetworkType::G4)).with_timestamp(ts),
        ]);
        let table = derive_temporal_features(table);
        let f = table.records()[0].features.unwrap();
        assert_eq!(f.time_of_day, TimeOfDay::Night);
        assert!(f.is_weekend);
    }

    #[test]
    fn table_without_timestamps_is_unchanged() {
        let table = TelemetryTable::from_records(vec![TelemetryRecord::new("A", None)]);
        let out = derive_temporal_features(table.clone());
        assert_eq!(out, table);
    }

    #[test]
    fn split_uses_configured_fraction() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let records = (0..10)
            .rev()
            .map(|h| {
                TelemetryRecord::new("A", Some(NetworkType::G4))
                    .with_timestamp(base + Duration::hours(h))
            })
            .collect();
        let table = TelemetryTable::from_records(records);
        let (train, test) = Preprocessor::default().split(&table).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert!(train.latest_timestamp() < test.earliest_timestamp());
    }
}
