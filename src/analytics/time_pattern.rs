//! Hour-of-day by day-of-week demand patterns.

use crate::core::TelemetryRecord;
use crate::core::TelemetryTable;
use crate::error::{Result, TelemetryError};
use crate::preprocess::DerivedFeatures;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const TOP_PEAK_HOURS: usize = 3;

/// Metric aggregated by the time-pattern analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMetric {
    Throughput,
    SignalStrength,
    Latency,
}

impl TimeMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeMetric::Throughput => "throughput",
            TimeMetric::SignalStrength => "signal_strength",
            TimeMetric::Latency => "latency",
        }
    }

    pub fn value(&self, record: &TelemetryRecord) -> Option<f64> {
        match self {
            TimeMetric::Throughput => record.data_throughput,
            TimeMetric::SignalStrength => record.signal_strength,
            TimeMetric::Latency => record.latency,
        }
    }
}

impl fmt::Display for TimeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeMetric {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "throughput" | "data_throughput" => Ok(TimeMetric::Throughput),
            "signal_strength" | "signal" => Ok(TimeMetric::SignalStrength),
            "latency" => Ok(TimeMetric::Latency),
            _ => Err(TelemetryError::InvalidMetric(s.to_string())),
        }
    }
}

/// Mean of a metric at one hour and day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub hour: u32,
    pub day: u32,
    pub day_name: &'static str,
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourAverage {
    pub hour: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePatternReport {
    pub metric: TimeMetric,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    pub sample_count: usize,
    /// `grid[hour][day]`, Monday = 0; `None` where no record falls.
    pub grid: Vec<Vec<Option<f64>>>,
    pub hourly_averages: Vec<Option<f64>>,
    pub daily_averages: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_day: Option<&'static str>,
    pub top_peak_hours: Vec<HourAverage>,
    pub heatmap: Vec<HeatmapCell>,
}

impl TimePatternReport {
    pub fn cell(&self, hour: u32, day: u32) -> Option<f64> {
        self.grid
            .get(hour as usize)
            .and_then(|row| row.get(day as usize))
            .copied()
            .flatten()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Acc {
    sum: f64,
    count: usize,
}

impl Acc {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Index of the largest present value; the earliest wins ties.
fn argmax(values: &[Option<f64>]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .fold(None::<(usize, f64)>, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Aggregate `metric` into a 24×7 grid, optionally for one locality.
pub fn analyze_time_patterns(
    table: &TelemetryTable,
    locality: Option<&str>,
    metric: TimeMetric,
) -> Result<TimePatternReport> {
    let locality = locality.map(|l| table.resolve_locality(l)).transpose()?;

    let mut cells = [[Acc::default(); 7]; 24];
    let mut hours = [Acc::default(); 24];
    let mut days = [Acc::default(); 7];
    let mut sample_count = 0;

    let records = table
        .records()
        .iter()
        .filter(|r| locality.map_or(true, |l| r.locality == l));
    for record in records {
        let Some(value) = metric.value(record) else {
            continue;
        };
        let Some(features) = record
            .features
            .or_else(|| record.timestamp.as_ref().map(DerivedFeatures::from_timestamp))
        else {
            continue;
        };
        let (h, d) = (features.hour_of_day as usize, features.day_of_week as usize);
        cells[h][d].add(value);
        hours[h].add(value);
        days[d].add(value);
        sample_count += 1;
    }

    let grid: Vec<Vec<Option<f64>>> = cells
        .iter()
        .map(|row| row.iter().map(Acc::mean).collect())
        .collect();
    let hourly_averages: Vec<Option<f64>> = hours.iter().map(Acc::mean).collect();
    let daily_averages: Vec<Option<f64>> = days.iter().map(Acc::mean).collect();

    let mut ranked: Vec<HourAverage> = hourly_averages
        .iter()
        .enumerate()
        .filter_map(|(h, v)| v.map(|value| HourAverage { hour: h as u32, value }))
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.hour.cmp(&b.hour)));
    ranked.truncate(TOP_PEAK_HOURS);

    let mut heatmap = Vec::new();
    for (h, row) in cells.iter().enumerate() {
        for (d, acc) in row.iter().enumerate() {
            if let Some(value) = acc.mean() {
                heatmap.push(HeatmapCell {
                    hour: h as u32,
                    day: d as u32,
                    day_name: DAY_NAMES[d],
                    value,
                    count: acc.count,
                });
            }
        }
    }

    Ok(TimePatternReport {
        metric,
        locality: locality.map(str::to_string),
        sample_count,
        peak_hour: argmax(&hourly_averages).map(|h| h as u32),
        peak_day: argmax(&daily_averages).map(|d| DAY_NAMES[d]),
        grid,
        hourly_averages,
        daily_averages,
        top_peak_hours: ranked,
        heatmap,
    })
}
