//! Delta-time evolution per calendar period
//!
//! Summarizes a segmented table as the mean `delta_t` of the events falling in
//! each period. This is the table descriptive collaborators (plots, reports)
//! consume; rendering itself happens behind [`DescriptiveSink`].

use crate::calendar::Granularity;
use crate::error::PipelineError;
use crate::schema::{coerce_timestamp, DELTA_T, TIMESTAMP};
use crate::types::EventTable;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Delta statistics for one calendar period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStat {
    /// First day of the period
    pub period: NaiveDate,
    /// Number of events in the period
    pub events: usize,
    /// Mean delta in fractional days (0 when the period has no events)
    pub mean_delta_days: f64,
}

/// Mean delta per period over the gap-free span of the segmented table
pub fn delta_evolution(
    segmented: &EventTable,
    granularity: Granularity,
) -> Result<Vec<PeriodStat>, PipelineError> {
    let timestamps = segmented.require(TIMESTAMP)?;
    let deltas = segmented.require(DELTA_T)?;

    let mut sums: BTreeMap<NaiveDate, (usize, f64)> = BTreeMap::new();
    for (row, (cell, delta)) in timestamps.iter().zip(deltas).enumerate() {
        let ts = coerce_timestamp(cell).map_err(|reason| PipelineError::TimestampParse {
            row,
            value: cell.to_string(),
            reason,
        })?;
        let entry = sums.entry(granularity.truncate(&ts)).or_default();
        entry.0 += 1;
        entry.1 += delta.as_f64().unwrap_or(0.0);
    }

    let (Some(&first), Some(&last)) = (sums.keys().next(), sums.keys().next_back()) else {
        return Ok(Vec::new());
    };

    Ok(granularity
        .range(first, last)
        .into_iter()
        .map(|period| {
            let (events, total) = sums.get(&period).copied().unwrap_or((0, 0.0));
            PeriodStat {
                period,
                events,
                mean_delta_days: if events > 0 { total / events as f64 } else { 0.0 },
            }
        })
        .collect())
}

/// Output-producing collaborator for per-behavior delta summaries
pub trait DescriptiveSink {
    fn render(
        &mut self,
        behavior: &str,
        granularity: Granularity,
        stats: &[PeriodStat],
    ) -> Result<(), PipelineError>;
}

/// Writes each summary as one JSON document per line
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[derive(Serialize)]
struct DeltaSummary<'a> {
    behavior: &'a str,
    granularity: Granularity,
    feature: &'static str,
    periods: &'a [PeriodStat],
}

impl<W: Write> DescriptiveSink for JsonSink<W> {
    fn render(
        &mut self,
        behavior: &str,
        granularity: Granularity,
        stats: &[PeriodStat],
    ) -> Result<(), PipelineError> {
        let summary = DeltaSummary {
            behavior,
            granularity,
            feature: DELTA_T,
            periods: stats,
        };
        serde_json::to_writer(&mut self.writer, &summary)?;
        writeln!(self.writer)?;
        Ok(())
    }
}
