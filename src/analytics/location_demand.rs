//! Locality demand ranking from normalized throughput, signal and latency.

use crate::config::AnalyticsConfig;
use crate::core::{TelemetryRecord, TelemetryTable};
use crate::error::{Result, TelemetryError};
use crate::transform::normalize;
use crate::utils::{mean_present, ColumnStats};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Hours before the latest timestamp kept by [`TimeRange::Current`].
pub const RECENCY_WINDOW_HOURS: i64 = 24;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Weights of the composite demand score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandWeights {
    pub throughput: f64,
    pub signal_strength: f64,
    pub latency: f64,
}

impl Default for DemandWeights {
    fn default() -> Self {
        Self {
            throughput: 0.4,
            signal_strength: 0.3,
            latency: 0.3,
        }
    }
}

impl DemandWeights {
    pub fn new(throughput: f64, signal_strength: f64, latency: f64) -> Self {
        Self {
            throughput,
            signal_strength,
            latency,
        }
    }

    /// Weights must be finite, non-negative and sum to one.
    pub fn validate(&self) -> Result<()> {
        let weights = [self.throughput, self.signal_strength, self.latency];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TelemetryError::InvalidWeights(format!(
                "weights must be finite and non-negative, got {:?}",
                weights
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(TelemetryError::InvalidWeights(format!(
                "weights must sum to 1, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// Score used to rank localities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMetric {
    Composite,
    Throughput,
    SignalStrength,
    Latency,
}

impl DemandMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemandMetric::Composite => "composite",
            DemandMetric::Throughput => "throughput",
            DemandMetric::SignalStrength => "signal_strength",
            DemandMetric::Latency => "latency",
        }
    }
}

impl fmt::Display for DemandMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemandMetric {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "composite" => Ok(DemandMetric::Composite),
            "throughput" | "data_throughput" => Ok(DemandMetric::Throughput),
            "signal_strength" | "signal" => Ok(DemandMetric::SignalStrength),
            "latency" => Ok(DemandMetric::Latency),
            _ => Err(TelemetryError::InvalidMetric(s.to_string())),
        }
    }
}

/// Records considered by the demand mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Records within the recency window of the latest timestamp.
    Current,
    All,
}

impl FromStr for TimeRange {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(TimeRange::Current),
            "all" => Ok(TimeRange::All),
            _ => Err(TelemetryError::InvalidParameter(format!(
                "time range must be 'current' or 'all', got '{}'",
                s
            ))),
        }
    }
}

/// Mean and sample standard deviation of one metric at a locality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
}

impl From<ColumnStats> for MetricSummary {
    fn from(stats: ColumnStats) -> Self {
        Self {
            mean: stats.mean,
            std: stats.std,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityDemand {
    pub rank: usize,
    pub locality: String,
    pub score: f64,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<MetricSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<MetricSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<MetricSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandReport {
    pub metric: DemandMetric,
    pub time_range: TimeRange,
    pub weights: DemandWeights,
    /// Highest score first.
    pub localities: Vec<LocalityDemand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_stats: Option<ColumnStats>,
    pub high_demand: Vec<String>,
    /// Lowest score first.
    pub low_demand: Vec<String>,
}

impl DemandReport {
    pub fn locality(&self, name: &str) -> Option<&LocalityDemand> {
        self.localities.iter().find(|l| l.locality == name)
    }
}

/// Records inside the requested range.
fn select_range<'a>(
    table: &'a TelemetryTable,
    time_range: TimeRange,
    window_hours: i64,
) -> Vec<&'a TelemetryRecord> {
    let latest = match time_range {
        TimeRange::All => None,
        TimeRange::Current => table.latest_timestamp(),
    };
    match latest {
        None => table.records().iter().collect(),
        Some(latest) => {
            let cutoff = latest - Duration::hours(window_hours);
            table
                .records()
                .iter()
                .filter(|r| r.timestamp.is_some_and(|ts| ts >= cutoff))
                .collect()
        }
    }
}

/// Min-max normalize the present entries; absent entries stay absent.
fn normalize_present(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let mut normalized = normalize(&present).into_iter();
    values
        .iter()
        .map(|v| v.and_then(|_| normalized.next()))
        .collect()
}

/// Rank localities by demand.
///
/// A locality without values for a metric contributes zero for that term.
pub fn analyze_location_demand(
    table: &TelemetryTable,
    metric: DemandMetric,
    time_range: TimeRange,
    config: &AnalyticsConfig,
) -> Result<DemandReport> {
    let weights = &config.demand_weights;
    weights.validate()?;

    let mut groups: BTreeMap<&str, Vec<&TelemetryRecord>> = BTreeMap::new();
    for record in select_range(table, time_range, config.recency_window_hours) {
        groups.entry(record.locality.as_str()).or_default().push(record);
    }

    let names: Vec<&str> = groups.keys().copied().collect();
    let column = |f: fn(&TelemetryRecord) -> Option<f64>| -> Vec<Option<ColumnStats>> {
        groups
            .values()
            .map(|records| ColumnStats::from_options(records.iter().map(|r| f(r))))
            .collect()
    };
    let throughput = column(|r| r.data_throughput);
    let signal = column(|r| r.signal_strength);
    let latency = column(|r| r.latency);

    let means = |stats: &[Option<ColumnStats>]| -> Vec<Option<f64>> {
        stats.iter().map(|s| s.map(|s| s.mean)).collect()
    };
    let t_norm = normalize_present(&means(&throughput));
    let s_norm = normalize_present(&means(&signal));
    let l_norm = normalize_present(&means(&latency));

    let mut localities: Vec<LocalityDemand> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let t = t_norm[i].unwrap_or(0.0);
            let s = s_norm[i].unwrap_or(0.0);
            let l_inv = l_norm[i].map_or(0.0, |l| 1.0 - l);
            let score = match metric {
                DemandMetric::Composite => {
                    weights.throughput * t + weights.signal_strength * s + weights.latency * l_inv
                }
                DemandMetric::Throughput => t,
                DemandMetric::SignalStrength => s,
                DemandMetric::Latency => l_inv,
            };
            let records = &groups[name];
            LocalityDemand {
                rank: 0,
                locality: name.to_string(),
                score,
                record_count: records.len(),
                latitude: mean_present(records.iter().map(|r| r.latitude)),
                longitude: mean_present(records.iter().map(|r| r.longitude)),
                throughput: throughput[i].map(MetricSummary::from),
                signal_strength: signal[i].map(MetricSummary::from),
                latency: latency[i].map(MetricSummary::from),
            }
        })
        .collect();

    localities.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.locality.cmp(&b.locality)));
    for (i, entry) in localities.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    let score_stats = ColumnStats::from_options(localities.iter().map(|l| Some(l.score)));
    let high_demand = localities
        .iter()
        .take(config.top_n)
        .map(|l| l.locality.clone())
        .collect();
    let low_demand = localities
        .iter()
        .rev()
        .take(config.top_n)
        .map(|l| l.locality.clone())
        .collect();

    Ok(DemandReport {
        metric,
        time_range,
        weights: weights.clone(),
        localities,
        score_stats,
        high_demand,
        low_demand,
    })
}
