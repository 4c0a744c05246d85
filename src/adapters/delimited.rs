//! Delimited text (CSV) event log source

use crate::error::PipelineError;
use crate::types::{EventTable, Value};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

use super::EventLogSource;

/// Reads a delimited file whose header row names the columns
///
/// Every field is kept as text; empty fields become nulls.
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parse delimited data from any reader
    pub fn read_from<R: Read>(reader: R, delimiter: u8) -> Result<EventTable, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

        for record in rdr.records() {
            let record = record?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(if field.is_empty() {
                    Value::Null
                } else {
                    Value::Text(field.to_string())
                });
            }
        }

        debug!(
            columns = headers.len(),
            rows = columns.first().map_or(0, Vec::len),
            "read delimited event log"
        );

        Ok(EventTable::from_columns(headers.into_iter().zip(columns))?)
    }

    /// Parse delimited data held in memory
    pub fn parse_str(data: &str) -> Result<EventTable, PipelineError> {
        Self::read_from(data.as_bytes(), b',')
    }
}

impl EventLogSource for CsvSource {
    fn read(&self) -> Result<EventTable, PipelineError> {
        let file = File::open(&self.path).map_err(|e| {
            PipelineError::Source(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        Self::read_from(file, self.delimiter)
    }
}
