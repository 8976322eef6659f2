//! Declared mapping from raw dataset headers to canonical fields.
//!
//! Headers are normalized (trimmed, lower-cased, a trailing unit in
//! parentheses removed, spaces and dashes folded to underscores) and then
//! looked up exactly in [`HEADER_VARIANTS`]. Nothing is matched by substring.

use crate::error::{Result, TelemetryError};
use std::fmt;
use tracing::warn;

/// Canonical telemetry columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Timestamp,
    Locality,
    NetworkType,
    SignalStrength,
    DataThroughput,
    Latency,
    Latitude,
    Longitude,
    /// Known to be constant in the source data; always dropped.
    SignalQuality,
}

impl CanonicalField {
    /// Canonical column name.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Timestamp => "Timestamp",
            CanonicalField::Locality => "Locality",
            CanonicalField::NetworkType => "Network_Type",
            CanonicalField::SignalStrength => "Signal_Strength",
            CanonicalField::DataThroughput => "Data_Throughput",
            CanonicalField::Latency => "Latency",
            CanonicalField::Latitude => "Latitude",
            CanonicalField::Longitude => "Longitude",
            CanonicalField::SignalQuality => "Signal_Quality",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Known normalized header spellings and the field each maps to.
pub const HEADER_VARIANTS: &[(&str, CanonicalField)] = &[
    ("timestamp", CanonicalField::Timestamp),
    ("time", CanonicalField::Timestamp),
    ("datetime", CanonicalField::Timestamp),
    ("date_time", CanonicalField::Timestamp),
    ("locality", CanonicalField::Locality),
    ("location", CanonicalField::Locality),
    ("city", CanonicalField::Locality),
    ("area", CanonicalField::Locality),
    ("network_type", CanonicalField::NetworkType),
    ("networktype", CanonicalField::NetworkType),
    ("network", CanonicalField::NetworkType),
    ("technology", CanonicalField::NetworkType),
    ("signal_strength", CanonicalField::SignalStrength),
    ("signalstrength", CanonicalField::SignalStrength),
    ("signal_strength_dbm", CanonicalField::SignalStrength),
    ("rssi", CanonicalField::SignalStrength),
    ("data_throughput", CanonicalField::DataThroughput),
    ("throughput", CanonicalField::DataThroughput),
    ("data_throughput_mbps", CanonicalField::DataThroughput),
    ("throughput_mbps", CanonicalField::DataThroughput),
    ("latency", CanonicalField::Latency),
    ("latency_ms", CanonicalField::Latency),
    ("latitude", CanonicalField::Latitude),
    ("lat", CanonicalField::Latitude),
    ("longitude", CanonicalField::Longitude),
    ("lon", CanonicalField::Longitude),
    ("lng", CanonicalField::Longitude),
    ("long", CanonicalField::Longitude),
    ("signal_quality", CanonicalField::SignalQuality),
    ("signal_quality_percent", CanonicalField::SignalQuality),
];

/// Normalize a raw header for lookup in [`HEADER_VARIANTS`].
///
/// `"Signal Strength (dBm)"` becomes `"signal_strength"`.
pub fn normalize_header(header: &str) -> String {
    let mut s = header.trim().to_lowercase();
    if let Some(open) = s.rfind('(') {
        if s.ends_with(')') {
            s.truncate(open);
        }
    }
    let folded: String = s
        .trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    // collapse runs of underscores
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

/// Look up the canonical field for a raw header.
pub fn resolve_header(header: &str) -> Option<CanonicalField> {
    let key = normalize_header(header);
    HEADER_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == key)
        .map(|(_, field)| *field)
}

/// Column positions of each canonical field in a raw table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMapping {
    pub timestamp: Option<usize>,
    pub locality: Option<usize>,
    pub network_type: Option<usize>,
    pub signal_strength: Option<usize>,
    pub data_throughput: Option<usize>,
    pub latency: Option<usize>,
    pub latitude: Option<usize>,
    pub longitude: Option<usize>,
    /// Positions of dropped signal-quality columns.
    pub dropped: Vec<usize>,
    /// Headers that matched no declared variant.
    pub unrecognized: Vec<String>,
}

impl SchemaMapping {
    /// Resolve raw headers into a mapping.
    ///
    /// Fails when two headers map to the same field, or when no metric
    /// column (signal strength, throughput, latency) is present.
    pub fn resolve(headers: &[String]) -> Result<Self> {
        let mut mapping = SchemaMapping::default();
        let mut seen: Vec<(CanonicalField, &str)> = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            let Some(field) = resolve_header(header) else {
                mapping.unrecognized.push(header.clone());
                continue;
            };

            if field == CanonicalField::SignalQuality {
                mapping.dropped.push(idx);
                continue;
            }

            if let Some((_, first)) = seen.iter().find(|(f, _)| *f == field) {
                return Err(TelemetryError::AmbiguousColumn {
                    field: field.name().to_string(),
                    first: first.to_string(),
                    second: header.clone(),
                });
            }
            seen.push((field, header.as_str()));

            let slot = match field {
                CanonicalField::Timestamp => &mut mapping.timestamp,
                CanonicalField::Locality => &mut mapping.locality,
                CanonicalField::NetworkType => &mut mapping.network_type,
                CanonicalField::SignalStrength => &mut mapping.signal_strength,
                CanonicalField::DataThroughput => &mut mapping.data_throughput,
                CanonicalField::Latency => &mut mapping.latency,
                CanonicalField::Latitude => &mut mapping.latitude,
                CanonicalField::Longitude => &mut mapping.longitude,
                CanonicalField::SignalQuality => continue,
            };
            *slot = Some(idx);
        }

        if mapping.signal_strength.is_none()
            && mapping.data_throughput.is_none()
            && mapping.latency.is_none()
        {
            return Err(TelemetryError::UnrecognizedSchema(format!(
                "no signal strength, throughput or latency column among {:?}",
                headers
            )));
        }

        if !mapping.unrecognized.is_empty() {
            warn!(columns = ?mapping.unrecognized, "ignoring unrecognized columns");
        }

        Ok(mapping)
    }
}
