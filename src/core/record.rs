//! Telemetry record and network type definitions.

use crate::error::TelemetryError;
use crate::preprocess::DerivedFeatures;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Radio access technology of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    #[serde(rename = "3G")]
    G3,
    #[serde(rename = "4G")]
    G4,
    #[serde(rename = "5G")]
    G5,
    #[serde(rename = "LTE")]
    Lte,
}

impl NetworkType {
    /// All supported network types in display order.
    pub const ALL: [NetworkType; 4] = [
        NetworkType::G3,
        NetworkType::G4,
        NetworkType::G5,
        NetworkType::Lte,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::G3 => "3G",
            NetworkType::G4 => "4G",
            NetworkType::G5 => "5G",
            NetworkType::Lte => "LTE",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "3G" => Ok(NetworkType::G3),
            "4G" => Ok(NetworkType::G4),
            "5G" => Ok(NetworkType::G5),
            "LTE" | "4G LTE" | "4G-LTE" => Ok(NetworkType::Lte),
            _ => Err(TelemetryError::InvalidNetworkType(s.to_string())),
        }
    }
}

/// One cleaned telemetry measurement.
///
/// Numeric fields are `None` only when the whole source column was empty
/// (or absent); see [`crate::preprocess::Preprocessor::clean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub locality: String,
    pub network_type: Option<NetworkType>,
    /// Received signal strength in dBm (negative).
    pub signal_strength: Option<f64>,
    /// Data throughput in Mbps.
    pub data_throughput: Option<f64>,
    /// Latency in milliseconds.
    pub latency: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Temporal features, present once derived and the record has a timestamp.
    pub features: Option<DerivedFeatures>,
}

impl TelemetryRecord {
    /// Create a record with only the identifying fields set.
    pub fn new(locality: impl Into<String>, network_type: Option<NetworkType>) -> Self {
        Self {
            timestamp: None,
            locality: locality.into(),
            network_type,
            signal_strength: None,
            data_throughput: None,
            latency: None,
            latitude: None,
            longitude: None,
            features: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_signal_strength(mut self, dbm: f64) -> Self {
        self.signal_strength = Some(dbm);
        self
    }

    pub fn with_throughput(mut self, mbps: f64) -> Self {
        self.data_throughput = Some(mbps);
        self
    }

    pub fn with_latency(mut self, ms: f64) -> Self {
        self.latency = Some(ms);
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}
