//! logseries - Event-log to behavior time-series pipeline
//!
//! logseries turns a case-based process event log into fixed-frequency
//! multivariate time series for Granger-causality testing between behavioral
//! categories, through a deterministic pipeline: log source → schema
//! normalization → behavior segmentation / series aggregation → encoding.
//!
//! ## Modules
//!
//! - **Normalizer**: map a log-specific vocabulary onto canonical columns and parse timestamps
//! - **Behavior**: per-behavior delta-time tables and their per-period evolution
//! - **Aggregator**: top-K behavior count series on a gap-free calendar axis

pub mod adapters;
pub mod aggregator;
pub mod behavior;
pub mod calendar;
pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod types;

pub use adapters::{CsvSource, EventLogSource, JsonFormat, JsonSource};
pub use aggregator::{build_series, BehaviorSeries, SeriesAggregator, SeriesBundle, SeriesConfig};
pub use behavior::{segment, BehaviorSegmenter, SegmentOptions};
pub use calendar::Granularity;
pub use encoder::BundleEncoder;
pub use error::{PipelineError, SchemaError, Stage};
pub use normalizer::{NormalizeOptions, Normalizer, TimestampPolicy};
pub use pipeline::{log_to_series, log_to_series_csv, PipelineConfig, SeriesProcessor};
pub use schema::SchemaMapping;
pub use types::{EventTable, Value};

/// Crate version embedded in JSON output
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for JSON output
pub const PRODUCER_NAME: &str = "logseries";
