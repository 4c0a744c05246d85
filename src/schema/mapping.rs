//! Source-to-canonical column mapping

use super::{ACTIVITY, CASE_ID, TIMESTAMP};
use serde::{Deserialize, Serialize};

/// A single rename rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRename {
    /// Column name in the source log vocabulary
    pub source: String,
    /// Canonical column name
    pub canonical: String,
}

/// Ordered rename rules from a log-specific vocabulary onto canonical names
///
/// Columns without a rule pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub renames: Vec<ColumnRename>,
}

impl Default for SchemaMapping {
    /// Vocabulary of the loan-application (BPI Challenge 2017) behavior log
    fn default() -> Self {
        Self::from_pairs([
            ("case_id", CASE_ID),
            ("event_i", ACTIVITY),
            ("timestamp_i", TIMESTAMP),
            ("accepted_i", "accepted"),
            ("case_outcome", "case_outcome"),
            ("case_accepted", "case_accepted"),
            ("case_canceled", "case_canceled"),
            ("case_refused", "case_refused"),
            ("tt_days", "TT"),
        ])
    }
}

impl SchemaMapping {
    /// Mapping that renames nothing
    pub fn identity() -> Self {
        Self {
            renames: Vec::new(),
        }
    }

    pub fn from_pairs<S, C, I>(pairs: I) -> Self
    where
        S: Into<String>,
        C: Into<String>,
        I: IntoIterator<Item = (S, C)>,
    {
        Self {
            renames: pairs
                .into_iter()
                .map(|(source, canonical)| ColumnRename {
                    source: source.into(),
                    canonical: canonical.into(),
                })
                .collect(),
        }
    }

    /// Canonical name for a source column
    pub fn canonical_name<'a>(&'a self, source: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|r| r.source == source)
            .map(|r| r.canonical.as_str())
            .unwrap_or(source)
    }
}
