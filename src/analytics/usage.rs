//! Network-type usage over an optional locality and time window.

use crate::core::{NetworkType, TelemetryRecord, TelemetryTable};
use crate::error::{Result, TelemetryError};
use crate::utils::mean_present;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Which end of a window a date bound closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Start,
    End,
}

/// Parse an ISO-8601 window bound.
///
/// Accepts RFC 3339, naive date-times (read as UTC) and plain dates. A plain
/// date opens at midnight for [`BoundSide::Start`] and closes at the last
/// second of the day for [`BoundSide::End`].
///
/// ```
/// use cellcast::analytics::{parse_date_bound, BoundSide};
///
/// let end = parse_date_bound("2024-01-31", BoundSide::End).unwrap();
/// assert_eq!(end.to_rfc3339(), "2024-01-31T23:59:59+00:00");
/// assert!(parse_date_bound("last tuesday", BoundSide::Start).is_err());
/// ```
pub fn parse_date_bound(raw: &str, side: BoundSide) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let time = match side {
            BoundSide::Start => NaiveTime::from_hms_opt(0, 0, 0),
            BoundSide::End => NaiveTime::from_hms_opt(23, 59, 59),
        };
        if let Some(time) = time {
            return Ok(date.and_time(time).and_utc());
        }
    }
    Err(TelemetryError::InvalidDateRange(format!(
        "cannot parse date bound '{}'",
        raw
    )))
}

/// Filters of a usage analysis. Absent fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageQuery {
    pub locality: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl UsageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Inclusive on both ends. Records without a timestamp only pass an
    /// unbounded window.
    fn matches(&self, record: &TelemetryRecord) -> bool {
        if let Some(locality) = &self.locality {
            if record.locality != *locality {
                return false;
            }
        }
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(ts) = record.timestamp else {
            return false;
        };
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Usage of one network type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkUsage {
    pub network_type: NetworkType,
    pub count: usize,
    /// Share of matching records, in percent.
    pub percentage: f64,
    pub mean_throughput: Option<f64>,
    pub mean_signal_strength: Option<f64>,
    pub mean_latency: Option<f64>,
}

/// Records per network type on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub counts: BTreeMap<NetworkType, usize>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub total_records: usize,
    pub networks: Vec<NetworkUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_network: Option<NetworkType>,
    pub daily_trends: Vec<DailyUsage>,
}

impl UsageReport {
    pub fn network(&self, network_type: NetworkType) -> Option<&NetworkUsage> {
        self.networks.iter().find(|n| n.network_type == network_type)
    }
}

/// Group matching records by network type.
///
/// Records without a network type count toward neither a group nor the total.
pub fn analyze_usage(table: &TelemetryTable, query: &UsageQuery) -> Result<UsageReport> {
    if let (Some(start), Some(end)) = (query.start, query.end) {
        if start > end {
            return Err(TelemetryError::InvalidDateRange(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
    }
    let locality = query
        .locality
        .as_deref()
        .map(|l| table.resolve_locality(l).map(str::to_string))
        .transpose()?;
    let query = UsageQuery {
        locality,
        ..query.clone()
    };

    let mut groups: BTreeMap<NetworkType, Vec<&TelemetryRecord>> = BTreeMap::new();
    for record in table.records().iter().filter(|r| query.matches(r)) {
        if let Some(nt) = record.network_type {
            groups.entry(nt).or_default().push(record);
        }
    }
    let total: usize = groups.values().map(Vec::len).sum();

    let networks: Vec<NetworkUsage> = groups
        .iter()
        .map(|(nt, records)| NetworkUsage {
            network_type: *nt,
            count: records.len(),
            percentage: 100.0 * records.len() as f64 / total as f64,
            mean_throughput: mean_present(records.iter().map(|r| r.data_throughput)),
            mean_signal_strength: mean_present(records.iter().map(|r| r.signal_strength)),
            mean_latency: mean_present(records.iter().map(|r| r.latency)),
        })
        .collect();

    // Ties go to the first type in display order
    let dominant_network = networks
        .iter()
        .fold(None::<&NetworkUsage>, |best, n| match best {
            Some(b) if b.count >= n.count => Some(b),
            _ => Some(n),
        })
        .map(|n| n.network_type);

    let mut days: BTreeMap<NaiveDate, BTreeMap<NetworkType, usize>> = BTreeMap::new();
    for (nt, records) in &groups {
        for ts in records.iter().filter_map(|r| r.timestamp) {
            *days.entry(ts.date_naive()).or_default().entry(*nt).or_default() += 1;
        }
    }
    let daily_trends = days
        .into_iter()
        .map(|(date, counts)| DailyUsage {
            date,
            total: counts.values().sum(),
            counts,
        })
        .collect();

    Ok(UsageReport {
        locality: query.locality.clone(),
        start: query.start,
        end: query.end,
        total_records: total,
        networks,
        dominant_network,
        daily_trends,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn table() -> TelemetryTable {
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(
                TelemetryRecord::new("Austin", Some(NetworkType::G5))
                    .with_timestamp(base() + Duration::hours(i * 12))
                    .with_throughput(100.0 + i as f64),
            );
        }
        for i in 0..2 {
            records.push(
                TelemetryRecord::new("Austin", Some(NetworkType::G4))
                    .with_timestamp(base() + Duration::hours(i * 24))
                    .with_latency(40.0),
            );
        }
        records.push(
            TelemetryRecord::new("Dallas", Some(NetworkType::Lte))
                .with_timestamp(base())
                .with_throughput(20.0),
        );
        records.push(TelemetryRecord::new("Dallas", None).with_timestamp(base()));
        TelemetryTable::from_records(records)
    }

    #[test]
    fn shares_and_means_per_network() {
        let report = analyze_usage(&table(), &UsageQuery::new()).unwrap();
        assert_eq!(report.total_records, 9);
        let g5 = report.network(NetworkType::G5).unwrap();
        assert_eq!(g5.count, 6);
        assert_relative_eq!(g5.percentage, 600.0 / 9.0, epsilon = 1e-9);
        assert_relative_eq!(g5.mean_throughput.unwrap(), 102.5);
        assert_eq!(g5.mean_latency, None);
        assert_eq!(report.network(NetworkType::G4).unwrap().mean_latency, Some(40.0));
        assert_eq!(report.dominant_network, Some(NetworkType::G5));

        let total: f64 = report.networks.iter().map(|n| n.percentage).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn window_is_inclusive() {
        let query = UsageQuery::new()
            .with_locality("Austin")
            .with_start(base() + Duration::hours(12))
            .with_end(base() + Duration::hours(36));
        let report = analyze_usage(&table(), &query).unwrap();
        // 5G at +12, +24, +36 and 4G at +24
        assert_eq!(report.network(NetworkType::G5).unwrap().count, 3);
        assert_eq!(report.network(NetworkType::G4).unwrap().count, 1);
        assert!(report.network(NetworkType::Lte).is_none());
    }

    #[test]
    fn daily_trends_count_per_day() {
        let query = UsageQuery::new().with_locality("Austin");
        let report = analyze_usage(&table(), &query).unwrap();
        assert_eq!(report.daily_trends.len(), 4);
        let first = &report.daily_trends[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.counts[&NetworkType::G5], 1);
        assert_eq!(first.total, 2);
    }

    #[test]
    fn inverted_window_and_bad_locality() {
        let query = UsageQuery::new().with_start(base()).with_end(base() - Duration::seconds(1));
        let err = analyze_usage(&table(), &query).unwrap_err();
        assert_eq!(err.code(), "INVALID_DATE_RANGE");

        let err = analyze_usage(&table(), &UsageQuery::new().with_locality("Paris")).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_LOCALITY");

        let err = analyze_usage(&table(), &UsageQuery::new().with_locality("  ")).unwrap_err();
        assert_eq!(err.code(), "MISSING_LOCALITY");
    }

    #[test]
    fn locality_filter_ignores_surrounding_whitespace() {
        let padded = analyze_usage(&table(), &UsageQuery::new().with_locality(" Austin ")).unwrap();
        let exact = analyze_usage(&table(), &UsageQuery::new().with_locality("Austin")).unwrap();
        assert_eq!(padded, exact);
        assert_eq!(padded.locality.as_deref(), Some("Austin"));
    }

    #[test]
    fn date_bounds_parse_common_layouts() {
        let start = parse_date_bound("2024-03-01", BoundSide::Start).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let naive = parse_date_bound("2024-03-01T08:30:00", BoundSide::End).unwrap();
        assert_eq!(naive, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());
        let zoned = parse_date_bound("2024-03-01T08:30:00+02:00", BoundSide::Start).unwrap();
        assert_eq!(zoned, Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap());
    }
}
