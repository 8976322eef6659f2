//! Dataset overview: counts, date range, metric statistics, localities.

use crate::core::{NetworkType, TelemetryTable};
use crate::utils::{mean_present, ColumnStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub locality_count: usize,
    pub network_type_count: usize,
    pub network_types: Vec<NetworkType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<ColumnStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_throughput: Option<ColumnStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<ColumnStats>,
}

/// A locality with its record count and mean coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityInfo {
    pub name: String,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

pub fn summarize(table: &TelemetryTable) -> DatasetSummary {
    let records = table.records();
    let network_types = table.network_types();
    let date_range = table
        .earliest_timestamp()
        .zip(table.latest_timestamp())
        .map(|(start, end)| DateRange { start, end });

    DatasetSummary {
        total_records: records.len(),
        locality_count: table.localities().len(),
        network_type_count: network_types.len(),
        network_types,
        date_range,
        signal_strength: ColumnStats::from_options(records.iter().map(|r| r.signal_strength)),
        data_throughput: ColumnStats::from_options(records.iter().map(|r| r.data_throughput)),
        latency: ColumnStats::from_options(records.iter().map(|r| r.latency)),
    }
}

/// Localities sorted by name.
pub fn locality_listing(table: &TelemetryTable) -> Vec<LocalityInfo> {
    let mut groups: BTreeMap<&str, Vec<(Option<f64>, Option<f64>)>> = BTreeMap::new();
    for r in table.records() {
        groups
            .entry(r.locality.as_str())
            .or_default()
            .push((r.latitude, r.longitude));
    }
    groups
        .into_iter()
        .map(|(name, coords)| LocalityInfo {
            name: name.to_string(),
            record_count: coords.len(),
            latitude: mean_present(coords.iter().map(|c| c.0)),
            longitude: mean_present(coords.iter().map(|c| c.1)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TelemetryRecord;
    use chrono::TimeZone;

    #[test]
    fn summary_counts_and_ranges() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let table = TelemetryTable::from_records(vec![
            TelemetryRecord::new("Austin", Some(NetworkType::G5))
                .with_timestamp(t1)
                .with_latency(10.0)
                .with_coordinates(30.0, -97.0),
            TelemetryRecord::new("Austin", Some(NetworkType::G4))
                .with_timestamp(t0)
                .with_latency(30.0)
                .with_coordinates(30.2, -97.2),
            TelemetryRecord::new("Dallas", None).with_timestamp(t0),
        ]);

        let summary = summarize(&table);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.locality_count, 2);
        assert_eq!(summary.network_types, vec![NetworkType::G4, NetworkType::G5]);
        assert_eq!(summary.date_range, Some(DateRange { start: t0, end: t1 }));
        let latency = summary.latency.unwrap();
        assert_eq!((latency.count, latency.mean, latency.min, latency.max), (2, 20.0, 10.0, 30.0));
        assert!(summary.signal_strength.is_none());

        let listing = locality_listing(&table);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "Austin");
        assert_eq!(listing[0].record_count, 2);
        assert!((listing[0].latitude.unwrap() - 30.1).abs() < 1e-9);
        assert_eq!(listing[1].latitude, None);
    }

    #[test]
    fn empty_table_summary() {
        let summary = summarize(&TelemetryTable::from_records(Vec::new()));
        assert_eq!(summary.total_records, 0);
        assert!(summary.date_range.is_none());
        assert!(summary.data_throughput.is_none());
    }
}
