//! Behavior-conditioned views of a normalized event table
//!
//! The segmenter filters events by behavioral category and derives per-case
//! delta times; the evolution module summarizes those deltas per calendar period
//! for descriptive collaborators.
//!
//! Pipeline: Normalized table → Segmenter → Delta evolution → DescriptiveSink

pub mod evolution;
pub mod segmenter;

pub use evolution::{delta_evolution, DescriptiveSink, JsonSink, PeriodStat};
pub use segmenter::{
    segment, verify_deltas, BehaviorSegmenter, OrderingViolation, Segment, SegmentOptions,
    SegmentReport,
};
