//! Schema normalization
//!
//! This module maps a raw event-log table onto the canonical schema.
//! - Source columns renamed through a [`SchemaMapping`]
//! - Required columns (case id, activity, timestamp) checked before any parsing
//! - Timestamp cells coerced to offset-aware date-times
//!
//! The input table is never mutated; normalizing an already normalized table
//! returns an equal table.

use crate::error::{PipelineError, SchemaError};
use crate::schema::{coerce_timestamp, SchemaMapping, CASE_ID, REQUIRED_COLUMNS, TIMESTAMP};
use crate::types::{EventTable, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How unparseable timestamps are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Fail the whole table on the first unparseable value
    #[default]
    Strict,
    /// Drop offending rows and report them
    Lenient,
}

/// Normalizer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub mapping: SchemaMapping,
    pub timestamp_policy: TimestampPolicy,
}

/// What a normalization run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Source rows dropped for unparseable timestamps (lenient mode only)
    pub dropped_rows: Vec<usize>,
    /// `(source, canonical)` pairs actually applied
    pub renamed: Vec<(String, String)>,
}

/// Normalized table together with its report
#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: EventTable,
    pub report: NormalizeReport,
}

/// Normalizer for converting raw log tables to canonical tables
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn with_mapping(mapping: SchemaMapping) -> Self {
        Self::new(NormalizeOptions {
            mapping,
            ..Default::default()
        })
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Normalize a raw table
    pub fn normalize(&self, raw: &EventTable) -> Result<EventTable, PipelineError> {
        self.normalize_with_report(raw).map(|n| n.table)
    }

    /// Normalize a raw table and report renames and dropped rows
    pub fn normalize_with_report(&self, raw: &EventTable) -> Result<Normalized, PipelineError> {
        let mut report = NormalizeReport {
            rows_in: raw.num_rows(),
            ..Default::default()
        };

        let mut renamed = Vec::with_capacity(raw.num_columns());
        for column in raw.columns() {
            let canonical = self.options.mapping.canonical_name(&column.name);
            if canonical != column.name {
                report
                    .renamed
                    .push((column.name.clone(), canonical.to_string()));
            }
            renamed.push((canonical.to_string(), column.values.clone()));
        }
        let table = EventTable::from_columns(renamed)?;

        for required in REQUIRED_COLUMNS {
            table.require(required)?;
        }

        if let Some(row) = table.require(CASE_ID)?.iter().position(Value::is_null) {
            return Err(SchemaError::NullCaseId { row }.into());
        }

        let (timestamps, keep) = self.coerce_timestamps(table.require(TIMESTAMP)?)?;

        let mut columns = table.into_columns();
        for column in &mut columns {
            if column.name == TIMESTAMP {
                column.values = timestamps.clone();
            }
        }
        let mut table = EventTable::from_columns(columns.into_iter().map(|c| (c.name, c.values)))?;

        if keep.len() != report.rows_in {
            report.dropped_rows = (0..report.rows_in)
                .filter(|row| keep.binary_search(row).is_err())
                .collect();
            warn!(
                dropped = report.dropped_rows.len(),
                "dropped rows with unparseable timestamps"
            );
            table = table.take_rows(&keep);
        }

        report.rows_out = table.num_rows();
        debug!(
            rows = report.rows_out,
            columns = table.num_columns(),
            renamed = report.renamed.len(),
            "normalized event table"
        );

        Ok(Normalized { table, report })
    }

    /// Coerced timestamp cells and the indices of rows that parsed
    fn coerce_timestamps(
        &self,
        cells: &[Value],
    ) -> Result<(Vec<Value>, Vec<usize>), PipelineError> {
        let mut values = Vec::with_capacity(cells.len());
        let mut keep = Vec::with_capacity(cells.len());

        for (row, cell) in cells.iter().enumerate() {
            match coerce_timestamp(cell) {
                Ok(ts) => {
                    values.push(Value::Timestamp(ts));
                    keep.push(row);
                }
                Err(reason) => match self.options.timestamp_policy {
                    TimestampPolicy::Strict => {
                        return Err(PipelineError::TimestampParse {
                            row,
                            value: cell.to_string(),
                            reason,
                        });
                    }
                    TimestampPolicy::Lenient => {
                        debug!(row, value = %cell, %reason, "skipping unparseable timestamp");
                        values.push(Value::Null);
                    }
                },
            }
        }

        Ok((values, keep))
    }
}
