//! Cleaned, in-memory telemetry table.

use crate::core::{NetworkType, SegmentKey, TelemetryRecord};
use crate::error::{Result, TelemetryError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Which canonical columns the source dataset provided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSet {
    pub timestamp: bool,
    pub locality: bool,
    pub network_type: bool,
    pub signal_strength: bool,
    pub data_throughput: bool,
    pub latency: bool,
    pub latitude: bool,
    pub longitude: bool,
}

impl ColumnSet {
    /// Infer the column set from the values present in the records.
    pub fn infer(records: &[TelemetryRecord]) -> Self {
        Self {
            timestamp: records.iter().any(|r| r.timestamp.is_some()),
            locality: !records.is_empty(),
            network_type: records.iter().any(|r| r.network_type.is_some()),
            signal_strength: records.iter().any(|r| r.signal_strength.is_some()),
            data_throughput: records.iter().any(|r| r.data_throughput.is_some()),
            latency: records.iter().any(|r| r.latency.is_some()),
            latitude: records.iter().any(|r| r.latitude.is_some()),
            longitude: records.iter().any(|r| r.longitude.is_some()),
        }
    }
}

/// A cleaned telemetry dataset.
///
/// Records are kept in timestamp order once produced by the preprocessor.
/// Records without a timestamp sort last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryTable {
    records: Vec<TelemetryRecord>,
    columns: ColumnSet,
}

impl TelemetryTable {
    pub fn new(records: Vec<TelemetryRecord>, columns: ColumnSet) -> Self {
        Self { records, columns }
    }

    /// Build a table from already-clean records, inferring the column set.
    pub fn from_records(records: Vec<TelemetryRecord>) -> Self {
        let columns = ColumnSet::infer(&records);
        Self { records, columns }
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [TelemetryRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<TelemetryRecord> {
        self.records
    }

    pub fn columns(&self) -> ColumnSet {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Same column set, different records.
    pub fn with_records(&self, records: Vec<TelemetryRecord>) -> Self {
        Self {
            records,
            columns: self.columns,
        }
    }

    /// Keep the records matching a predicate.
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&TelemetryRecord) -> bool,
    {
        self.with_records(
            self.records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
        )
    }

    /// Whether any record carries a timestamp.
    pub fn has_timestamps(&self) -> bool {
        self.records.iter().any(|r| r.timestamp.is_some())
    }

    pub fn earliest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.iter().filter_map(|r| r.timestamp).min()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.iter().filter_map(|r| r.timestamp).max()
    }

    /// Sorted, distinct localities.
    pub fn localities(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.locality.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains_locality(&self, locality: &str) -> bool {
        self.records.iter().any(|r| r.locality == locality)
    }

    /// Trim a requested locality and check that the table has it.
    ///
    /// Blank input is `MissingLocality`, an absent one `UnknownLocality`.
    pub fn resolve_locality<'a>(&self, locality: &'a str) -> Result<&'a str> {
        let locality = locality.trim();
        if locality.is_empty() {
            return Err(TelemetryError::MissingLocality);
        }
        if !self.contains_locality(locality) {
            return Err(TelemetryError::UnknownLocality(locality.to_string()));
        }
        Ok(locality)
    }

    /// Sorted, distinct network types.
    pub fn network_types(&self) -> Vec<NetworkType> {
        self.records
            .iter()
            .filter_map(|r| r.network_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct segments present in the table.
    pub fn segments(&self) -> BTreeSet<SegmentKey> {
        self.records.iter().filter_map(SegmentKey::of).collect()
    }

    /// Records grouped by segment, preserving table order inside each group.
    pub fn partition_by_segment(&self) -> BTreeMap<SegmentKey, Vec<&TelemetryRecord>> {
        let mut groups: BTreeMap<SegmentKey, Vec<&TelemetryRecord>> = BTreeMap::new();
        for record in &self.records {
            if let Some(key) = SegmentKey::of(record) {
                groups.entry(key).or_default().push(record);
            }
        }
        groups
    }

    /// Records of one segment, in table order.
    pub fn segment_records(&self, key: &SegmentKey) -> Vec<&TelemetryRecord> {
        self.records
            .iter()
            .filter(|r| r.locality == key.locality && r.network_type == Some(key.network_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn sample() -> TelemetryTable {
        TelemetryTable::from_records(vec![
            TelemetryRecord::new("Dallas", Some(NetworkType::G4))
                .with_timestamp(ts(1))
                .with_throughput(10.0),
            TelemetryRecord::new("Austin", Some(NetworkType::G5))
                .with_timestamp(ts(2))
                .with_throughput(20.0),
            TelemetryRecord::new("Austin", Some(NetworkType::G5))
                .with_timestamp(ts(3))
                .with_throughput(30.0),
            TelemetryRecord::new("Austin", None).with_timestamp(ts(4)),
        ])
    }

    #[test]
    fn localities_are_sorted_and_distinct() {
        assert_eq!(sample().localities(), vec!["Austin", "Dallas"]);
    }

    #[test]
    fn requested_localities_are_trimmed() {
        let table = sample();
        assert_eq!(table.resolve_locality("  Austin\t").unwrap(), "Austin");
        assert_eq!(table.resolve_locality(" ").unwrap_err(), TelemetryError::MissingLocality);
        assert_eq!(
            table.resolve_locality(" Houston ").unwrap_err(),
            TelemetryError::UnknownLocality("Houston".into())
        );
    }

    #[test]
    fn partitions_skip_unknown_network_type() {
        let table = sample();
        let groups = table.partition_by_segment();
        assert_eq!(groups.len(), 2);
        let austin = &groups[&SegmentKey::new("Austin", NetworkType::G5)];
        assert_eq!(austin.len(), 2);
    }

    #[test]
    fn column_set_is_inferred() {
        let cols = sample().columns();
        assert!(cols.timestamp);
        assert!(cols.data_throughput);
        assert!(!cols.latency);
    }

    #[test]
    fn timestamp_bounds() {
        let table = sample();
        assert_eq!(table.earliest_timestamp(), Some(ts(1)));
        assert_eq!(table.latest_timestamp(), Some(ts(4)));
    }
}
