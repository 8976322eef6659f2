//! Aggregations computed directly over the cleaned dataset.
//!
//! Nothing here holds learned state; every call reads the table it is given.

pub mod location_demand;
pub mod summary;
pub mod time_pattern;
pub mod usage;

pub use location_demand::{
    analyze_location_demand, DemandMetric, DemandReport, DemandWeights, LocalityDemand,
    MetricSummary, TimeRange, RECENCY_WINDOW_HOURS,
};
pub use summary::{locality_listing, summarize, DatasetSummary, DateRange, LocalityInfo};
pub use time_pattern::{
    analyze_time_patterns, HeatmapCell, HourAverage, TimeMetric, TimePatternReport, DAY_NAMES,
};
pub use usage::{
    analyze_usage, parse_date_bound, BoundSide, DailyUsage, NetworkUsage, UsageQuery, UsageReport,
};
