//! Behavior series aggregation
//!
//! Builds the multivariate series handed to causality analysis:
//! 1. Truncate every timestamp to the start of its calendar period
//! 2. Count events per (period, behavior)
//! 3. Keep the top-K behaviors by total count
//! 4. Align all series on one gap-free calendar axis spanning the whole table
//!
//! Ties in the ranking are broken by first appearance of the label in the table.
//! Rows with a null behavior are not a category but still widen the axis.

use crate::calendar::Granularity;
use crate::error::PipelineError;
use crate::schema::{coerce_timestamp, BEHAVIOR, TIMESTAMP};
use crate::types::EventTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Default number of behaviors kept
pub const DEFAULT_TOP_K: usize = 4;

/// Default series name prefix
pub const DEFAULT_PREFIX: &str = "All_";

/// Aggregator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub granularity: Granularity,
    pub top_k: usize,
    pub prefix: String,
    pub behavior_column: String,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Day,
            top_k: DEFAULT_TOP_K,
            prefix: DEFAULT_PREFIX.to_string(),
            behavior_column: BEHAVIOR.to_string(),
        }
    }
}

/// Event counts of one behavior on the bundle's axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BehaviorSeries {
    /// Raw behavior label
    pub label: String,
    /// Prefixed series name
    pub name: String,
    pub values: Vec<u64>,
}

/// Aligned, gap-free series, one per selected behavior
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SeriesBundle {
    pub granularity: Granularity,
    /// Period start dates, ascending and contiguous
    pub index: Vec<NaiveDate>,
    /// Series in rank order
    pub series: Vec<BehaviorSeries>,
}

impl SeriesBundle {
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BehaviorSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Aggregator for behavior count series
#[derive(Debug, Clone, Default)]
pub struct SeriesAggregator {
    config: SeriesConfig,
}

impl SeriesAggregator {
    pub fn new(config: SeriesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    /// Build the series bundle for a normalized table
    pub fn build_series(&self, table: &EventTable) -> Result<SeriesBundle, PipelineError> {
        let granularity = self.config.granularity;
        if table.is_empty() {
            return Ok(SeriesBundle {
                granularity,
                ..Default::default()
            });
        }

        let timestamps = table.require(TIMESTAMP)?;
        let labels = table.require(&self.config.behavior_column)?;

        let mut periods = Vec::with_capacity(timestamps.len());
        for (row, cell) in timestamps.iter().enumerate() {
            let ts = coerce_timestamp(cell).map_err(|reason| PipelineError::TimestampParse {
                row,
                value: cell.to_string(),
                reason,
            })?;
            periods.push(granularity.truncate(&ts));
        }

        let ranking = rank_behaviors(labels.iter().map(|v| v.key()));
        let selected: Vec<&(String, u64)> = ranking.iter().take(self.config.top_k).collect();

        let (Some(&first), Some(&last)) = (periods.iter().min(), periods.iter().max()) else {
            return Ok(SeriesBundle {
                granularity,
                ..Default::default()
            });
        };
        let index = granularity.range(first, last);
        let position: HashMap<NaiveDate, usize> =
            index.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        let column: HashMap<&str, usize> = selected
            .iter()
            .enumerate()
            .map(|(i, (label, _))| (label.as_str(), i))
            .collect();

        let mut counts = vec![vec![0u64; index.len()]; selected.len()];
        for (label, period) in labels.iter().zip(&periods) {
            let Some(label) = label.key() else { continue };
            if let (Some(&col), Some(&pos)) = (column.get(label.as_str()), position.get(period)) {
                counts[col][pos] += 1;
            }
        }

        let series = selected
            .into_iter()
            .zip(counts)
            .map(|((label, _), values)| BehaviorSeries {
                label: label.clone(),
                name: format!("{}{}", self.config.prefix, label),
                values,
            })
            .collect::<Vec<_>>();

        debug!(
            periods = index.len(),
            behaviors = ranking.len(),
            selected = series.len(),
            granularity = %granularity,
            "built behavior series"
        );

        Ok(SeriesBundle {
            granularity,
            index,
            series,
        })
    }
}

/// Build the bundle with default configuration
pub fn build_series(table: &EventTable) -> Result<SeriesBundle, PipelineError> {
    SeriesAggregator::default().build_series(table)
}

/// Behavior labels with their total counts, most frequent first
///
/// Equal counts keep the order in which labels first appear.
pub fn rank_behaviors<I>(labels: I) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut totals: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for label in labels.into_iter().flatten() {
        match index.get(&label) {
            Some(&i) => totals[i].1 += 1,
            None => {
                index.insert(label.clone(), totals.len());
                totals.push((label, 1));
            }
        }
    }

    // stable: ties stay in first-appearance order
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals
}
