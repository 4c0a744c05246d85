//! JSON record event log source
//!
//! Accepts either a JSON array of flat objects or newline-delimited JSON with one
//! object per line. Keys missing from a record become nulls.

use crate::error::PipelineError;
use crate::types::{EventTable, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::EventLogSource;

/// Layout of a JSON event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonFormat {
    /// A single array of records
    Array,
    /// One record per line
    #[default]
    Ndjson,
}

/// Reads JSON event records from a file
pub struct JsonSource {
    path: PathBuf,
    format: JsonFormat,
}

impl JsonSource {
    pub fn new(path: impl Into<PathBuf>, format: JsonFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<EventTable, PipelineError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut builder = RecordTableBuilder::default();
        for (idx, record) in records.into_iter().enumerate() {
            builder.push(record).map_err(|e| {
                PipelineError::Source(format!("Record {} is not an object: {}", idx, e))
            })?;
        }
        builder.finish()
    }

    /// Parse NDJSON (newline-delimited JSON) records
    pub fn parse_ndjson(ndjson: &str) -> Result<EventTable, PipelineError> {
        let mut builder = RecordTableBuilder::default();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                PipelineError::Source(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            builder.push(record).map_err(|e| {
                PipelineError::Source(format!("Line {} is not an object: {}", line_num + 1, e))
            })?;
        }
        builder.finish()
    }

    pub fn parse(data: &str, format: JsonFormat) -> Result<EventTable, PipelineError> {
        match format {
            JsonFormat::Array => Self::parse_array(data),
            JsonFormat::Ndjson => Self::parse_ndjson(data),
        }
    }
}

impl EventLogSource for JsonSource {
    fn read(&self) -> Result<EventTable, PipelineError> {
        let data = fs::read_to_string(&self.path).map_err(|e| {
            PipelineError::Source(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Self::parse(&data, self.format)
    }
}

/// Accumulates records column by column
#[derive(Default)]
struct RecordTableBuilder {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl RecordTableBuilder {
    fn push(&mut self, record: serde_json::Value) -> Result<(), String> {
        let fields = match record {
            serde_json::Value::Object(fields) => fields,
            other => return Err(format!("found {}", json_kind(&other))),
        };

        for (key, value) in fields {
            let idx = match self.index.get(&key) {
                Some(&idx) => idx,
                None => {
                    self.names.push(key.clone());
                    self.index.insert(key, self.columns.len());
                    self.columns.push(vec![Value::Null; self.rows]);
                    self.columns.len() - 1
                }
            };
            self.columns[idx].push(Value::from(value));
        }

        self.rows += 1;
        for column in &mut self.columns {
            if column.len() < self.rows {
                column.push(Value::Null);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<EventTable, PipelineError> {
        Ok(EventTable::from_columns(
            self.names.into_iter().zip(self.columns),
        )?)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"case_id": "1", "event_i": "A_Create", "timestamp_i": "2016-01-01T09:00:00Z"}

{"case_id": "1", "event_i": "A_Submit", "timestamp_i": "2016-01-01T10:00:00Z", "tt_days": 3.5}"#;

        let table = JsonSource::parse_ndjson(ndjson).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("tt_days").unwrap()[0], Value::Null);
        assert_eq!(table.column("tt_days").unwrap()[1], Value::Float(3.5));
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"case_id": 1, "accepted_i": true}, {"case_id": 2}]"#;
        let table = JsonSource::parse_array(json).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("case_id").unwrap()[1], Value::Int(2));
        assert_eq!(table.column("accepted_i").unwrap()[0], Value::Bool(true));
        assert!(table.column("accepted_i").unwrap()[1].is_null());
    }

    #[test]
    fn test_ndjson_error_names_line() {
        let ndjson = "{\"a\": 1}\nnot json\n";
        let err = JsonSource::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_non_object_record() {
        let err = JsonSource::parse_array("[1, 2]").unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }

    #[test]
    fn test_empty_input() {
        let table = JsonSource::parse_ndjson("").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
    }
}
