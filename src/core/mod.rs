//! Core data structures for telemetry records, tables and segments.

mod raw;
mod record;
mod segment;
mod table;

pub use raw::RawTable;
pub use record::{NetworkType, TelemetryRecord};
pub use segment::{SegmentKey, Target};
pub use table::{ColumnSet, TelemetryTable};
