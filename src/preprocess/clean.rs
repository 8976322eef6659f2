//! Raw table cleaning: schema resolution, parsing, ordering and imputation.

use crate::core::{ColumnSet, NetworkType, RawTable, TelemetryRecord, TelemetryTable};
use crate::error::{Result, TelemetryError};
use crate::preprocess::schema::SchemaMapping;
use crate::preprocess::temporal::parse_timestamp;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Counters describing what cleaning had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub rows: usize,
    pub invalid_timestamps: usize,
    pub invalid_network_types: usize,
    pub synthesized_localities: usize,
    pub dropped_columns: usize,
}

/// Forward-fill then back-fill missing values in place.
///
/// A slice with no present value is left untouched.
pub fn fill_gaps<T: Clone>(values: &mut [Option<T>]) {
    let mut last: Option<T> = None;
    for v in values.iter_mut() {
        match v {
            Some(present) => last = Some(present.clone()),
            None => *v = last.clone(),
        }
    }
    let mut next: Option<T> = None;
    for v in values.iter_mut().rev() {
        match v {
            Some(present) => next = Some(present.clone()),
            None => *v = next.clone(),
        }
    }
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

struct ParsedRow {
    source_index: usize,
    timestamp: Option<DateTime<Utc>>,
    locality: Option<String>,
    network_type: Option<NetworkType>,
}

/// Clean a raw table into a sorted, imputed [`TelemetryTable`].
///
/// Temporal features are not attached here; see
/// [`crate::preprocess::derive_temporal_features`].
pub fn clean_table(raw: &RawTable) -> Result<(TelemetryTable, CleaningReport)> {
    if raw.is_empty() {
        return Err(TelemetryError::EmptyDataset);
    }

    let mapping = SchemaMapping::resolve(raw.headers())?;
    let n = raw.len();
    let mut report = CleaningReport {
        rows: n,
        dropped_columns: mapping.dropped.len(),
        ..Default::default()
    };

    let numeric = |col: Option<usize>| -> Vec<Option<f64>> {
        (0..n)
            .map(|row| col.and_then(|c| parse_number(raw.cell(row, c))))
            .collect()
    };

    let mut timestamps: Vec<Option<DateTime<Utc>>> = (0..n)
        .map(|row| {
            mapping.timestamp.and_then(|c| {
                let cell = raw.cell(row, c)?;
                let parsed = parse_timestamp(cell);
                if parsed.is_none() {
                    report.invalid_timestamps += 1;
                }
                parsed
            })
        })
        .collect();
    // Unparseable timestamps inherit their neighbours in source order.
    fill_gaps(&mut timestamps);

    let mut rows: Vec<(ParsedRow, [Option<f64>; 5])> = Vec::with_capacity(n);
    let signal = numeric(mapping.signal_strength);
    let throughput = numeric(mapping.data_throughput);
    let latency = numeric(mapping.latency);
    let latitude = numeric(mapping.latitude);
    let longitude = numeric(mapping.longitude);

    for row in 0..n {
        let network_type = mapping.network_type.and_then(|c| {
            let cell = raw.cell(row, c)?;
            match cell.parse::<NetworkType>() {
                Ok(nt) => Some(nt),
                Err(_) => {
                    report.invalid_network_types += 1;
                    None
                }
            }
        });
        let locality = mapping
            .locality
            .and_then(|c| raw.cell(row, c))
            .map(|s| s.to_string());

        rows.push((
            ParsedRow {
                source_index: row,
                timestamp: timestamps[row],
                locality,
                network_type,
            },
            [
                signal[row],
                throughput[row],
                latency[row],
                latitude[row],
                longitude[row],
            ],
        ));
    }

    // Stable sort, rows without a timestamp last.
    rows.sort_by_key(|(parsed, _)| (parsed.timestamp.is_none(), parsed.timestamp));

    let mut columns: [Vec<Option<f64>>; 5] = Default::default();
    for (_, values) in &rows {
        for (col, value) in columns.iter_mut().zip(values.iter()) {
            col.push(*value);
        }
    }
    for col in columns.iter_mut() {
        fill_gaps(col);
    }
    let [signal, throughput, latency, latitude, longitude] = columns;

    let mut records = Vec::with_capacity(n);
    for (i, (parsed, _)) in rows.into_iter().enumerate() {
        let locality = match parsed.locality {
            Some(l) => l,
            None => {
                report.synthesized_localities += 1;
                match (latitude[i], longitude[i]) {
                    (Some(lat), Some(lon)) => format!("Loc_{:.4}_{:.4}", lat, lon),
                    _ => parsed.source_index.to_string(),
                }
            }
        };

        records.push(TelemetryRecord {
            timestamp: parsed.timestamp,
            locality,
            network_type: parsed.network_type,
            signal_strength: signal[i],
            data_throughput: throughput[i],
            latency: latency[i],
            latitude: latitude[i],
            longitude: longitude[i],
            features: None,
        });
    }

    let columns = ColumnSet {
        timestamp: mapping.timestamp.is_some() && records.iter().any(|r| r.timestamp.is_some()),
        locality: mapping.locality.is_some(),
        network_type: mapping.network_type.is_some(),
        signal_strength: mapping.signal_strength.is_some(),
        data_throughput: mapping.data_throughput.is_some(),
        latency: mapping.latency.is_some(),
        latitude: mapping.latitude.is_some(),
        longitude: mapping.longitude.is_some(),
    };

    if report.invalid_timestamps > 0 || report.invalid_network_types > 0 {
        debug!(
            invalid_timestamps = report.invalid_timestamps,
            invalid_network_types = report.invalid_network_types,
            "repaired invalid cells"
        );
    }
    info!(
        rows = report.rows,
        dropped_columns = report.dropped_columns,
        synthesized_localities = report.synthesized_localities,
        "cleaned telemetry table"
    );

    Ok((TelemetryTable::new(records, columns), report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_gaps_forward_then_backward() {
        let mut v = vec![None, Some(1.0), None, None, Some(4.0), None];
        fill_gaps(&mut v);
        assert_eq!(
            v,
            vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn fill_gaps_leaves_empty_column() {
        let mut v: Vec<Option<f64>> = vec![None, None];
        fill_gaps(&mut v);
        assert_eq!(v, vec![None, None]);
    }

    #[test]
    fn sorts_and_imputes() {
        let raw = RawTable::from_rows(
            &["Timestamp", "Locality", "Network Type", "Data Throughput (Mbps)", "Signal Quality (%)"],
            &[
                vec!["2024-01-01 12:00:00", "Austin", "5G", "30", "0.0"],
                vec!["2024-01-01 10:00:00", "Austin", "5G", "", "0.0"],
                vec!["2024-01-01 11:00:00", "Austin", "5G", "20", "0.0"],
            ],
        );
        let (table, report) = clean_table(&raw).unwrap();

        let throughput: Vec<_> = table.records().iter().map(|r| r.data_throughput).collect();
        // sorted 10:00 (missing), 11:00 (20), 12:00 (30); back-fill gives 20
        assert_eq!(throughput, vec![Some(20.0), Some(20.0), Some(30.0)]);
        assert_eq!(report.dropped_columns, 1);
        assert!(table.columns().timestamp);
        assert!(!table.columns().latency);
        assert!(table.records().iter().all(|r| r.latency.is_none()));
    }

    #[test]
    fn invalid_timestamp_is_kept_and_imputed() {
        let raw = RawTable::from_rows(
            &["timestamp", "locality", "latency"],
            &[
                vec!["2024-01-01 10:00:00", "A", "10"],
                vec!["garbage", "A", "11"],
                vec!["2024-01-01 10:20:00", "A", "12"],
            ],
        );
        let (table, report) = clean_table(&raw).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(report.invalid_timestamps, 1);
        assert!(table.records().iter().all(|r| r.timestamp.is_some()));
    }

    #[test]
    fn locality_synthesized_from_coordinates_then_index() {
        let raw = RawTable::from_rows(
            &["latency", "lat", "lon"],
            &[vec!["10", "30.26718", "-97.74306"]],
        );
        let (table, report) = clean_table(&raw).unwrap();
        assert_eq!(table.records()[0].locality, "Loc_30.2672_-97.7431");
        assert_eq!(report.synthesized_localities, 1);

        let raw = RawTable::from_rows(&["latency"], &[vec!["10"], vec!["11"]]);
        let (table, _) = clean_table(&raw).unwrap();
        assert_eq!(table.records()[0].locality, "0");
        assert_eq!(table.records()[1].locality, "1");
    }

    #[test]
    fn invalid_network_type_becomes_missing() {
        let raw = RawTable::from_rows(
            &["latency", "network_type"],
            &[vec!["10", "6G"], vec!["11", "lte"]],
        );
        let (table, report) = clean_table(&raw).unwrap();
        assert_eq!(table.records()[0].network_type, None);
        assert_eq!(table.records()[1].network_type, Some(NetworkType::Lte));
        assert_eq!(report.invalid_network_types, 1);
    }

    #[test]
    fn empty_table_is_rejected() {
        let raw = RawTable::from_rows(&["latency"], &[]);
        assert_eq!(clean_table(&raw).unwrap_err(), TelemetryError::EmptyDataset);
    }
}
