//! Segment keys and forecast targets.

use crate::core::{NetworkType, TelemetryRecord};
use crate::error::TelemetryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The unit of model training and serving: (locality, network type).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub locality: String,
    pub network_type: NetworkType,
}

impl SegmentKey {
    pub fn new(locality: impl Into<String>, network_type: NetworkType) -> Self {
        Self {
            locality: locality.into(),
            network_type,
        }
    }

    /// Segment of a record, if its network type is known.
    pub fn of(record: &TelemetryRecord) -> Option<Self> {
        record
            .network_type
            .map(|nt| Self::new(record.locality.clone(), nt))
    }

    /// Filesystem-safe stem used by the model store.
    pub fn file_stem(&self) -> String {
        let locality: String = self
            .locality
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        format!("{}__{}", locality, self.network_type)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.locality, self.network_type)
    }
}

/// Metric a segment model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    SignalStrength,
    Throughput,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::SignalStrength, Target::Throughput];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::SignalStrength => "signal_strength",
            Target::Throughput => "throughput",
        }
    }

    /// Observed value of this target in a record.
    pub fn value(&self, record: &TelemetryRecord) -> Option<f64> {
        match self {
            Target::SignalStrength => record.signal_strength,
            Target::Throughput => record.data_throughput,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signal_strength" | "signal-strength" | "signal" => Ok(Target::SignalStrength),
            "throughput" | "data_throughput" => Ok(Target::Throughput),
            _ => Err(TelemetryError::InvalidMetric(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_is_filesystem_safe() {
        let key = SegmentKey::new("New York/Queens", NetworkType::Lte);
        assert_eq!(key.file_stem(), "New_York_Queens__LTE");
    }

    #[test]
    fn display_joins_locality_and_network() {
        let key = SegmentKey::new("Austin", NetworkType::G5);
        assert_eq!(key.to_string(), "Austin_5G");
    }

    #[test]
    fn segment_requires_network_type() {
        let record = TelemetryRecord::new("Austin", None);
        assert!(SegmentKey::of(&record).is_none());
    }

    #[test]
    fn target_parses_aliases() {
        assert_eq!("signal".parse::<Target>().unwrap(), Target::SignalStrength);
        assert_eq!("Throughput".parse::<Target>().unwrap(), Target::Throughput);
        assert!("latency".parse::<Target>().is_err());
    }
}
