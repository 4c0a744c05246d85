//! Behavior segmentation
//!
//! Selects the events of one behavioral category and appends, per case, the time
//! elapsed since the previous event of that case (`delta_t`, fractional days).
//! Events are sorted by timestamp within each case before deltas are taken, so
//! every delta is non-negative and the first event of a case has delta 0.

use crate::error::PipelineError;
use crate::schema::{coerce_timestamp, BEHAVIOR, CASE_ID, DELTA_T, TIMESTAMP};
use crate::types::{EventTable, Value};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Segmenter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    /// Column holding the behavioral category label
    pub behavior_column: String,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            behavior_column: BEHAVIOR.to_string(),
        }
    }
}

/// An in-case timestamp regression found in storage order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderingViolation {
    pub case_id: String,
    /// Row index in the input table
    pub row: usize,
    /// Negative delta the unsorted rows would have produced
    pub delta_days: f64,
}

/// Summary of a segmentation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SegmentReport {
    pub behavior: String,
    pub rows: usize,
    pub cases: usize,
    pub ordering_violations: Vec<OrderingViolation>,
}

/// Segmented table together with its report
#[derive(Debug, Clone)]
pub struct Segment {
    pub table: EventTable,
    pub report: SegmentReport,
}

/// Segmenter for behavior-conditioned delta tables
#[derive(Debug, Clone, Default)]
pub struct BehaviorSegmenter {
    options: SegmentOptions,
}

impl BehaviorSegmenter {
    pub fn new(options: SegmentOptions) -> Self {
        Self { options }
    }

    /// Filter `table` to `behavior` and append the delta column
    pub fn segment(&self, table: &EventTable, behavior: &str) -> Result<EventTable, PipelineError> {
        self.segment_with_report(table, behavior).map(|s| s.table)
    }

    /// Same as [`segment`](Self::segment), also reporting ordering violations
    pub fn segment_with_report(
        &self,
        table: &EventTable,
        behavior: &str,
    ) -> Result<Segment, PipelineError> {
        let labels = table.require(&self.options.behavior_column)?;
        let case_ids = table.require(CASE_ID)?;
        let timestamps = table.require(TIMESTAMP)?;

        // Cases in order of first appearance, rows in storage order
        let mut cases: Vec<(String, Vec<usize>)> = Vec::new();
        let mut case_index: HashMap<String, usize> = HashMap::new();
        for (row, label) in labels.iter().enumerate() {
            if label.key().as_deref() != Some(behavior) {
                continue;
            }
            let case_id = case_ids[row].key().unwrap_or_default();
            let idx = *case_index.entry(case_id.clone()).or_insert_with(|| {
                cases.push((case_id, Vec::new()));
                cases.len() - 1
            });
            cases[idx].1.push(row);
        }

        let mut report = SegmentReport {
            behavior: behavior.to_string(),
            cases: cases.len(),
            ..Default::default()
        };

        let mut order = Vec::new();
        let mut deltas = Vec::new();
        for (case_id, rows) in &cases {
            let mut events = rows
                .iter()
                .map(|&row| parse_row_timestamp(&timestamps[row], row).map(|ts| (row, ts)))
                .collect::<Result<Vec<_>, _>>()?;

            for pair in events.windows(2) {
                let delta_days = fractional_days(pair[1].1 - pair[0].1);
                if delta_days < 0.0 {
                    warn!(
                        case_id = %case_id,
                        row = pair[1].0,
                        delta_days,
                        "events out of timestamp order within case"
                    );
                    report.ordering_violations.push(OrderingViolation {
                        case_id: case_id.clone(),
                        row: pair[1].0,
                        delta_days,
                    });
                }
            }

            events.sort_by_key(|&(_, ts)| ts);

            let mut previous: Option<DateTime<FixedOffset>> = None;
            for (row, ts) in events {
                order.push(row);
                deltas.push(Value::Float(
                    previous.map_or(0.0, |prev| fractional_days(ts - prev)),
                ));
                previous = Some(ts);
            }
        }

        let mut segmented = without_column(&table.take_rows(&order), DELTA_T)?;
        segmented.push_column(DELTA_T, deltas)?;
        report.rows = segmented.num_rows();

        debug!(
            behavior,
            rows = report.rows,
            cases = report.cases,
            violations = report.ordering_violations.len(),
            "segmented behavior"
        );

        Ok(Segment {
            table: segmented,
            report,
        })
    }
}

/// Segment with the default behavior column
pub fn segment(table: &EventTable, behavior: &str) -> Result<EventTable, PipelineError> {
    BehaviorSegmenter::default().segment(table, behavior)
}

/// Post-condition check: fails on the first negative delta
pub fn verify_deltas(segmented: &EventTable) -> Result<(), PipelineError> {
    let deltas = segmented.require(DELTA_T)?;
    let case_ids = segmented.require(CASE_ID)?;

    for (row, delta) in deltas.iter().enumerate() {
        let delta_days = delta.as_f64().unwrap_or(0.0);
        if delta_days < 0.0 {
            return Err(PipelineError::OrderingViolation {
                case_id: case_ids[row].key().unwrap_or_default(),
                row,
                delta_days,
            });
        }
    }
    Ok(())
}

fn parse_row_timestamp(cell: &Value, row: usize) -> Result<DateTime<FixedOffset>, PipelineError> {
    coerce_timestamp(cell).map_err(|reason| PipelineError::TimestampParse {
        row,
        value: cell.to_string(),
        reason,
    })
}

fn fractional_days(delta: Duration) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6 / SECONDS_PER_DAY,
        None => delta.num_seconds() as f64 / SECONDS_PER_DAY,
    }
}

fn without_column(table: &EventTable, name: &str) -> Result<EventTable, PipelineError> {
    if !table.has_column(name) {
        return Ok(table.clone());
    }
    Ok(EventTable::from_columns(
        table
            .columns()
            .iter()
            .filter(|c| c.name != name)
            .map(|c| (c.name.clone(), c.values.clone())),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::schema::ACTIVITY;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> Value {
        Value::Timestamp(DateTime::parse_from_rfc3339(s).unwrap())
    }

    fn table(rows: &[(&str, &str, &str)]) -> EventTable {
        EventTable::from_columns(vec![
            (CASE_ID, rows.iter().map(|r| Value::from(r.0)).collect()),
            (ACTIVITY, rows.iter().map(|_| Value::from("A_Create")).collect()),
            (TIMESTAMP, rows.iter().map(|r| ts(r.1)).collect()),
            (BEHAVIOR, rows.iter().map(|r| Value::from(r.2)).collect()),
        ])
        .unwrap()
    }

    fn deltas(table: &EventTable) -> Vec<f64> {
        table
            .column(DELTA_T)
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn test_single_case_delta() {
        let t = table(&[
            ("X", "2016-01-01T00:00:00Z", "C"),
            ("X", "2016-01-02T00:00:00Z", "C"),
            ("X", "2016-01-04T00:00:00Z", "C"),
        ]);
        let segmented = segment(&t, "C").unwrap();
        assert_eq!(deltas(&segmented), vec![0.0, 1.0, 2.0]);
        assert_eq!(segmented.column_names().last(), Some(&DELTA_T));
    }

    #[test]
    fn test_fractional_days() {
        let t = table(&[
            ("X", "2016-01-01T00:00:00Z", "C"),
            ("X", "2016-01-01T06:00:00Z", "C"),
        ]);
        let segmented = segment(&t, "C").unwrap();
        assert!((deltas(&segmented)[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_filters_and_groups_by_case() {
        let t = table(&[
            ("1", "2016-01-01T00:00:00Z", "C"),
            ("2", "2016-01-01T12:00:00Z", "C"),
            ("1", "2016-01-02T00:00:00Z", "D"),
            ("1", "2016-01-03T00:00:00Z", "C"),
            ("2", "2016-01-02T00:00:00Z", "C"),
        ]);
        let segmented = segment(&t, "C").unwrap();

        let cases: Vec<String> = segmented
            .column(CASE_ID)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(cases, vec!["1", "1", "2", "2"]);
        assert_eq!(deltas(&segmented), vec![0.0, 2.0, 0.0, 0.5]);
    }

    #[test]
    fn test_unsorted_input_is_sorted_and_reported() {
        let t = table(&[
            ("X", "2016-01-04T00:00:00Z", "C"),
            ("X", "2016-01-01T00:00:00Z", "C"),
            ("X", "2016-01-02T00:00:00Z", "C"),
        ]);
        let result = BehaviorSegmenter::default()
            .segment_with_report(&t, "C")
            .unwrap();

        assert_eq!(deltas(&result.table), vec![0.0, 1.0, 2.0]);
        assert_eq!(result.report.ordering_violations.len(), 1);
        assert_eq!(result.report.ordering_violations[0].row, 1);
        assert_eq!(result.report.ordering_violations[0].delta_days, -3.0);
        verify_deltas(&result.table).unwrap();
    }

    #[test]
    fn test_deltas_non_negative_and_first_zero() {
        let t = table(&[
            ("a", "2016-01-05T10:00:00Z", "C"),
            ("b", "2016-01-01T00:00:00+02:00", "C"),
            ("a", "2016-01-02T08:00:00Z", "C"),
            ("b", "2016-01-01T00:00:00Z", "C"),
            ("a", "2016-01-02T08:00:00Z", "C"),
        ]);
        let segmented = segment(&t, "C").unwrap();
        let case_ids = segmented.column(CASE_ID).unwrap();
        let d = deltas(&segmented);

        for row in 0..segmented.num_rows() {
            assert!(d[row] >= 0.0);
            if row == 0 || case_ids[row] != case_ids[row - 1] {
                assert_eq!(d[row], 0.0);
            }
        }
    }

    #[test]
    fn test_empty_behavior_filter() {
        let t = table(&[("1", "2016-01-01T00:00:00Z", "C")]);
        let segmented = segment(&t, "Z").unwrap();
        assert_eq!(segmented.num_rows(), 0);
        assert!(segmented.has_column(DELTA_T));
    }

    #[test]
    fn test_label_is_case_sensitive() {
        let t = table(&[("1", "2016-01-01T00:00:00Z", "C")]);
        assert_eq!(segment(&t, "c").unwrap().num_rows(), 0);
    }

    #[test]
    fn test_missing_behavior_column() {
        let t = EventTable::from_columns(vec![
            (CASE_ID, vec![Value::from("1")]),
            (TIMESTAMP, vec![ts("2016-01-01T00:00:00Z")]),
        ])
        .unwrap();
        let err = segment(&t, "C").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Schema(SchemaError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_resegmenting_replaces_delta() {
        let t = table(&[
            ("X", "2016-01-01T00:00:00Z", "C"),
            ("X", "2016-01-02T00:00:00Z", "C"),
        ]);
        let once = segment(&t, "C").unwrap();
        let twice = segment(&once, "C").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_verify_deltas_detects_negative() {
        let t = EventTable::from_columns(vec![
            (CASE_ID, vec![Value::from("X"), Value::from("X")]),
            (DELTA_T, vec![Value::Float(0.0), Value::Float(-1.0)]),
        ])
        .unwrap();
        let err = verify_deltas(&t).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::OrderingViolation { row: 1, .. }
        ));
    }
}
