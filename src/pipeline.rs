//! Pipeline orchestration
//!
//! This module provides the public API for logseries.
//! It wires a log source through normalization into the two independent
//! consumers of the normalized table: behavior segmentation (descriptive) and
//! series aggregation (causality input).

use crate::adapters::EventLogSource;
use crate::aggregator::{SeriesAggregator, SeriesBundle, SeriesConfig};
use crate::behavior::{
    delta_evolution, BehaviorSegmenter, DescriptiveSink, PeriodStat, SegmentOptions,
    SegmentReport,
};
use crate::calendar::Granularity;
use crate::encoder::BundleEncoder;
use crate::error::{PipelineError, Stage};
use crate::normalizer::{NormalizeOptions, NormalizeReport, Normalizer};
use crate::types::EventTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Configuration for a whole pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalize: NormalizeOptions,
    pub segment: SegmentOptions,
    pub series: SeriesConfig,
}

impl PipelineConfig {
    /// Parse a configuration from JSON; omitted sections keep their defaults
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Convert an event log into a behavior series bundle (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let bundle = log_to_series(&CsvSource::new("bpic2017.csv"), &PipelineConfig::default())?;
/// ```
pub fn log_to_series(
    source: &dyn EventLogSource,
    config: &PipelineConfig,
) -> Result<SeriesBundle, PipelineError> {
    let processor = SeriesProcessor::new(config.clone());
    let normalized = processor.read(source)?;
    processor.build_series(&normalized)
}

/// Convert an event log into the CSV consumed by causality analysis.
pub fn log_to_series_csv(
    source: &dyn EventLogSource,
    config: &PipelineConfig,
) -> Result<String, PipelineError> {
    let bundle = log_to_series(source, config)?;
    BundleEncoder::new()
        .encode_csv(&bundle)
        .map_err(|e| e.in_stage(Stage::Encode))
}

/// Descriptive analysis of one behavior
#[derive(Debug, Clone)]
pub struct BehaviorAnalysis {
    /// Segmented table with the appended `delta_t` column
    pub table: EventTable,
    pub report: SegmentReport,
    /// Mean delta per period
    pub evolution: Vec<PeriodStat>,
}

/// Configured processor running individual stages.
///
/// Stages work on the table they are given; only [`process`](Self::process)
/// remembers its normalization report.
pub struct SeriesProcessor {
    normalizer: Normalizer,
    segmenter: BehaviorSegmenter,
    aggregator: SeriesAggregator,
    last_normalize_report: Option<NormalizeReport>,
}

impl Default for SeriesProcessor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl SeriesProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config.normalize),
            segmenter: BehaviorSegmenter::new(config.segment),
            aggregator: SeriesAggregator::new(config.series),
            last_normalize_report: None,
        }
    }

    /// Read from a source and normalize
    pub fn read(&self, source: &dyn EventLogSource) -> Result<EventTable, PipelineError> {
        let raw = source.read().map_err(|e| e.in_stage(Stage::Read))?;
        self.normalize(&raw)
    }

    /// Normalize a raw table
    pub fn normalize(&self, raw: &EventTable) -> Result<EventTable, PipelineError> {
        self.normalize_with_report(raw).map(|(table, _)| table)
    }

    /// Normalize a raw table, returning the normalization report
    pub fn normalize_with_report(
        &self,
        raw: &EventTable,
    ) -> Result<(EventTable, NormalizeReport), PipelineError> {
        let normalized = self
            .normalizer
            .normalize_with_report(raw)
            .map_err(|e| e.in_stage(Stage::Normalize))?;
        info!(
            rows_in = normalized.report.rows_in,
            rows_out = normalized.report.rows_out,
            dropped = normalized.report.dropped_rows.len(),
            "normalized event log"
        );
        Ok((normalized.table, normalized.report))
    }

    /// Segment one behavior and summarize its deltas per period
    pub fn analyze_behavior(
        &self,
        normalized: &EventTable,
        behavior: &str,
        granularity: Granularity,
    ) -> Result<BehaviorAnalysis, PipelineError> {
        let segment = self
            .segmenter
            .segment_with_report(normalized, behavior)
            .map_err(|e| e.in_behavior_stage(Stage::Segment, behavior))?;
        let evolution = delta_evolution(&segment.table, granularity)
            .map_err(|e| e.in_behavior_stage(Stage::Segment, behavior))?;

        info!(
            behavior,
            rows = segment.report.rows,
            cases = segment.report.cases,
            periods = evolution.len(),
            "analyzed behavior"
        );

        Ok(BehaviorAnalysis {
            table: segment.table,
            report: segment.report,
            evolution,
        })
    }

    /// Analyze a behavior and hand the summary to a descriptive sink
    pub fn describe_behavior(
        &self,
        normalized: &EventTable,
        behavior: &str,
        granularity: Granularity,
        sink: &mut dyn DescriptiveSink,
    ) -> Result<BehaviorAnalysis, PipelineError> {
        let analysis = self.analyze_behavior(normalized, behavior, granularity)?;
        sink.render(behavior, granularity, &analysis.evolution)
            .map_err(|e| e.in_behavior_stage(Stage::Encode, behavior))?;
        Ok(analysis)
    }

    /// Build the behavior series bundle
    pub fn build_series(&self, normalized: &EventTable) -> Result<SeriesBundle, PipelineError> {
        let bundle = self
            .aggregator
            .build_series(normalized)
            .map_err(|e| e.in_stage(Stage::Aggregate))?;
        info!(
            periods = bundle.index.len(),
            series = ?bundle.names(),
            "built series bundle"
        );
        Ok(bundle)
    }

    /// Build the bundle and write it as CSV
    pub fn export_csv<W: Write>(
        &self,
        normalized: &EventTable,
        writer: W,
    ) -> Result<SeriesBundle, PipelineError> {
        let bundle = self.build_series(normalized)?;
        BundleEncoder::new()
            .write_csv(&bundle, writer)
            .map_err(|e| e.in_stage(Stage::Encode))?;
        Ok(bundle)
    }

    /// Run read, normalize and aggregate, remembering the normalization report
    pub fn process(&mut self, source: &dyn EventLogSource) -> Result<SeriesBundle, PipelineError> {
        let raw = source.read().map_err(|e| e.in_stage(Stage::Read))?;
        let (normalized, report) = self.normalize_with_report(&raw)?;
        self.last_normalize_report = Some(report);
        self.build_series(&normalized)
    }

    /// Report of the last normalization done by [`process`](Self::process)
    pub fn last_normalize_report(&self) -> Option<&NormalizeReport> {
        self.last_normalize_report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CsvSource;
    use crate::behavior::JsonSink;
    use crate::normalizer::TimestampPolicy;
    use crate::schema::DELTA_T;
    use pretty_assertions::assert_eq;

    fn sample_log() -> EventTable {
        CsvSource::parse_str(
            "case_id,event_i,timestamp_i,behavior,accepted_i,tt_days\n\
             1,A_Create,2016-01-01 09:00:00+00:00,A,true,3.1\n\
             1,A_Submit,2016-01-01 12:00:00+00:00,A,true,3.1\n\
             2,A_Create,2016-01-01 15:00:00+00:00,B,false,1.0\n\
             1,O_Sent,2016-01-03 09:00:00+00:00,A,true,3.1\n",
        )
        .unwrap()
    }

    #[test]
    fn test_log_to_series_basic_pivot() {
        let bundle = log_to_series(&sample_log(), &PipelineConfig::default()).unwrap();

        assert_eq!(bundle.index.len(), 3);
        assert_eq!(bundle.get("All_A").unwrap().values, vec![2, 0, 1]);
        assert_eq!(bundle.get("All_B").unwrap().values, vec![1, 0, 0]);
    }

    #[test]
    fn test_log_to_series_csv() {
        let csv = log_to_series_csv(&sample_log(), &PipelineConfig::default()).unwrap();
        assert_eq!(
            csv,
            "time:timestamp,All_A,All_B\n\
             2016-01-01,2,1\n\
             2016-01-02,0,0\n\
             2016-01-03,1,0\n"
        );
    }

    #[test]
    fn test_analyze_behavior() {
        let processor = SeriesProcessor::default();
        let normalized = processor.normalize(&sample_log()).unwrap();
        let analysis = processor
            .analyze_behavior(&normalized, "A", Granularity::Day)
            .unwrap();

        assert_eq!(analysis.report.rows, 3);
        assert_eq!(analysis.report.cases, 1);
        let deltas: Vec<f64> = analysis
            .table
            .column(DELTA_T)
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(deltas, vec![0.0, 0.125, 1.875]);
        assert_eq!(analysis.evolution.len(), 3);
    }

    #[test]
    fn test_describe_behavior_writes_sink() {
        let processor = SeriesProcessor::default();
        let normalized = processor.normalize(&sample_log()).unwrap();
        let mut sink = JsonSink::new(Vec::new());
        processor
            .describe_behavior(&normalized, "B", Granularity::Week, &mut sink)
            .unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("\"behavior\":\"B\""));
    }

    #[test]
    fn test_empty_behavior_is_not_an_error() {
        let processor = SeriesProcessor::default();
        let normalized = processor.normalize(&sample_log()).unwrap();
        let analysis = processor
            .analyze_behavior(&normalized, "nope", Granularity::Day)
            .unwrap();
        assert_eq!(analysis.table.num_rows(), 0);
        assert!(analysis.evolution.is_empty());
    }

    #[test]
    fn test_stage_is_reported() {
        let raw = CsvSource::parse_str("case_id,event_i\n1,A\n").unwrap();
        let err = log_to_series(&raw, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Normalize));
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_process_keeps_report() {
        let raw = CsvSource::parse_str(
            "case_id,event_i,timestamp_i,behavior\n\
             1,A,2016-01-01,X\n\
             1,B,not-a-date,X\n",
        )
        .unwrap();
        let mut config = PipelineConfig::default();
        config.normalize.timestamp_policy = TimestampPolicy::Lenient;

        let mut processor = SeriesProcessor::new(config);
        let bundle = processor.process(&raw).unwrap();

        assert_eq!(bundle.get("All_X").unwrap().values, vec![1]);
        assert_eq!(
            processor.last_normalize_report().unwrap().dropped_rows,
            vec![1]
        );
    }

    #[test]
    fn test_config_from_json() {
        let config = PipelineConfig::from_json(
            r#"{"series": {"top_k": 2, "granularity": "week"}, "normalize": {"timestamp_policy": "lenient"}}"#,
        )
        .unwrap();

        assert_eq!(config.series.top_k, 2);
        assert_eq!(config.series.granularity, Granularity::Week);
        assert_eq!(config.series.prefix, "All_");
        assert_eq!(config.normalize.timestamp_policy, TimestampPolicy::Lenient);
        assert_eq!(config.segment, SegmentOptions::default());
    }

    #[test]
    fn test_config_load_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), r#"{"series": {"prefix": "bpic_"}}"#).unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.series.prefix, "bpic_");
    }
}
