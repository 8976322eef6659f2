//! Temporal feature derivation and timestamp parsing.
//!
//! Every feature here is a pure function of the timestamp, so features
//! derived at training time and at forecast time always agree.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Part of the day a timestamp falls into.
///
/// Bands are contiguous: morning 05–11, afternoon 12–16, evening 17–21,
/// night 22–04.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// Ordinal encoding: morning 0, afternoon 1, evening 2, night 3.
    pub fn encoded(&self) -> u8 {
        match self {
            TimeOfDay::Morning => 0,
            TimeOfDay::Afternoon => 1,
            TimeOfDay::Evening => 2,
            TimeOfDay::Night => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar features of a single timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Hour of day, 0–23.
    pub hour_of_day: u32,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub day_of_week: u32,
    /// Day of month, 1–31.
    pub day_of_month: u32,
    /// Month, 1–12.
    pub month: u32,
    pub is_weekend: bool,
    pub time_of_day: TimeOfDay,
    pub time_of_day_encoded: u8,
}

impl DerivedFeatures {
    /// Derive all features from a timestamp.
    pub fn from_timestamp(ts: &DateTime<Utc>) -> Self {
        let hour_of_day = ts.hour();
        let day_of_week = ts.weekday().num_days_from_monday();
        let time_of_day = TimeOfDay::from_hour(hour_of_day);
        Self {
            hour_of_day,
            day_of_week,
            day_of_month: ts.day(),
            month: ts.month(),
            is_weekend: day_of_week >= 5,
            time_of_day,
            time_of_day_encoded: time_of_day.encoded(),
        }
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse a timestamp cell, returning `None` for anything unrecognized.
///
/// Accepts RFC 3339, common naive date-time layouts (interpreted as UTC),
/// plain `YYYY-MM-DD` dates (midnight), and integer epoch seconds with at
/// least nine digits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    if s.len() >= 9 && s.chars().all(|c| c.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
    }

    None
}
