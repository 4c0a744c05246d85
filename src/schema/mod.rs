//! Canonical event-log schema
//!
//! This module defines the canonical column vocabulary every normalized table
//! uses, the configurable rename mapping from a log-specific vocabulary, and
//! timestamp coercion.

mod mapping;
mod timestamp;

pub use mapping::*;
pub use timestamp::*;

/// Case identifier column
pub const CASE_ID: &str = "case:concept:name";

/// Activity label column
pub const ACTIVITY: &str = "concept:name";

/// Event timestamp column
pub const TIMESTAMP: &str = "time:timestamp";

/// Default behavioral category column
pub const BEHAVIOR: &str = "behavior";

/// Derived delta-time column appended by the segmenter (fractional days)
pub const DELTA_T: &str = "delta_t";

/// Columns every normalized table carries
pub const REQUIRED_COLUMNS: [&str; 3] = [CASE_ID, ACTIVITY, TIMESTAMP];
