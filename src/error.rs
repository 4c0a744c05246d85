//! Error types for logseries

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage, used to tell the caller where a fatal error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Read,
    Normalize,
    Segment,
    Aggregate,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Read => "read",
            Stage::Normalize => "normalize",
            Stage::Segment => "segment",
            Stage::Aggregate => "aggregate",
            Stage::Encode => "encode",
        })
    }
}

/// Errors raised while mapping a source table onto the canonical schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Duplicate column after renaming: {column}")]
    DuplicateColumn { column: String },

    #[error("Null case identifier at row {row}")]
    NullCaseId { row: usize },

    #[error("Column {column} has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur anywhere in the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Unparseable timestamp {value:?} at row {row}: {reason}")]
    TimestampParse {
        row: usize,
        value: String,
        reason: String,
    },

    #[error("Ordering violation in case {case_id} at row {row}: delta {delta_days} days")]
    OrderingViolation {
        case_id: String,
        row: usize,
        delta_days: f64,
    },

    #[error("Failed to read event log: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "{stage} stage failed{}: {source}",
        .behavior.as_deref().map(|b| format!(" for behavior {b:?}")).unwrap_or_default()
    )]
    StageFailed {
        stage: Stage,
        behavior: Option<String>,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Short machine-readable code for reporting
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Schema(_) => "SCHEMA_ERROR",
            PipelineError::TimestampParse { .. } => "TIMESTAMP_PARSE_ERROR",
            PipelineError::OrderingViolation { .. } => "ORDERING_VIOLATION",
            PipelineError::Source(_) => "SOURCE_ERROR",
            PipelineError::Io(_) => "IO_ERROR",
            PipelineError::Csv(_) => "CSV_ERROR",
            PipelineError::Json(_) => "JSON_ERROR",
            PipelineError::StageFailed { source, .. } => source.code(),
        }
    }

    /// Stage the error was raised in, if known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Attach the failing stage
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ PipelineError::StageFailed { .. } => already,
            other => PipelineError::StageFailed {
                stage,
                behavior: None,
                source: Box::new(other),
            },
        }
    }

    /// Attach the failing stage and behavior label
    pub fn in_behavior_stage(self, stage: Stage, behavior: &str) -> Self {
        match self {
            already @ PipelineError::StageFailed { .. } => already,
            other => PipelineError::StageFailed {
                stage,
                behavior: Some(behavior.to_string()),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_converts() {
        let err: PipelineError = SchemaError::MissingColumn {
            column: "time:timestamp".to_string(),
        }
        .into();

        assert_eq!(err.code(), "SCHEMA_ERROR");
        assert_eq!(
            err.to_string(),
            "Schema error: Missing required column: time:timestamp"
        );
    }

    #[test]
    fn test_timestamp_error_names_row() {
        let err = PipelineError::TimestampParse {
            row: 7,
            value: "yesterday".to_string(),
            reason: "unrecognized format".to_string(),
        };
        assert!(err.to_string().contains("row 7"));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_stage_context() {
        let err = PipelineError::Source("boom".to_string()).in_behavior_stage(Stage::Segment, "C");
        assert_eq!(err.stage(), Some(Stage::Segment));
        assert_eq!(err.code(), "SOURCE_ERROR");
        assert_eq!(
            err.to_string(),
            "segment stage failed for behavior \"C\": Failed to read event log: boom"
        );

        // an attached stage is kept
        let rewrapped = err.in_stage(Stage::Encode);
        assert_eq!(rewrapped.stage(), Some(Stage::Segment));
    }
}
