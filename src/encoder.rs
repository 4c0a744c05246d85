//! Series bundle encoding
//!
//! This module persists a [`SeriesBundle`] for downstream causality analysis.
//! - CSV: one row per period (ascending, none omitted), one column per series
//! - JSON: the same data plus producer metadata

use crate::aggregator::SeriesBundle;
use crate::calendar::Granularity;
use crate::error::PipelineError;
use crate::schema::TIMESTAMP;
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use uuid::Uuid;

/// Date format of the period key column
pub const PERIOD_FORMAT: &str = "%Y-%m-%d";

/// Encoder for persisted series bundles
pub struct BundleEncoder {
    instance_id: String,
}

impl Default for BundleEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer metadata embedded in JSON output
#[derive(Debug, Serialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// JSON document for a bundle
#[derive(Debug, Serialize)]
pub struct BundleDocument {
    pub producer: Producer,
    pub computed_at_utc: String,
    pub granularity: Granularity,
    pub index: Vec<String>,
    /// Series names in rank order
    pub columns: Vec<String>,
    pub series: BTreeMap<String, Vec<u64>>,
}

impl BundleEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Write the bundle as CSV with the period as row key
    pub fn write_csv<W: Write>(&self, bundle: &SeriesBundle, writer: W) -> Result<(), PipelineError> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec![TIMESTAMP.to_string()];
        header.extend(bundle.series.iter().map(|s| s.name.clone()));
        wtr.write_record(&header)?;

        for (row, period) in bundle.index.iter().enumerate() {
            let mut record = vec![period.format(PERIOD_FORMAT).to_string()];
            record.extend(bundle.series.iter().map(|s| s.values[row].to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Encode the bundle as a CSV string
    pub fn encode_csv(&self, bundle: &SeriesBundle) -> Result<String, PipelineError> {
        let mut buf = Vec::new();
        self.write_csv(bundle, &mut buf)?;
        String::from_utf8(buf).map_err(|e| PipelineError::Source(e.to_string()))
    }

    /// Build the JSON document for a bundle
    pub fn encode(&self, bundle: &SeriesBundle) -> BundleDocument {
        BundleDocument {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            granularity: bundle.granularity,
            index: bundle
                .index
                .iter()
                .map(|d| d.format(PERIOD_FORMAT).to_string())
                .collect(),
            columns: bundle.series.iter().map(|s| s.name.clone()).collect(),
            series: bundle
                .series
                .iter()
                .map(|s| (s.name.clone(), s.values.clone()))
                .collect(),
        }
    }

    /// Encode to pretty JSON string
    pub fn encode_to_json(&self, bundle: &SeriesBundle) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(&self.encode(bundle)).map_err(PipelineError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::BehaviorSeries;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sample_bundle() -> SeriesBundle {
        SeriesBundle {
            granularity: Granularity::Day,
            index: vec![
                NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2016, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2016, 1, 3).unwrap(),
            ],
            series: vec![
                BehaviorSeries {
                    label: "B".to_string(),
                    name: "All_B".to_string(),
                    values: vec![2, 0, 1],
                },
                BehaviorSeries {
                    label: "A".to_string(),
                    name: "All_A".to_string(),
                    values: vec![1, 0, 0],
                },
            ],
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = BundleEncoder::new().encode_csv(&sample_bundle()).unwrap();
        assert_eq!(
            csv,
            "time:timestamp,All_B,All_A\n\
             2016-01-01,2,1\n\
             2016-01-02,0,0\n\
             2016-01-03,1,0\n"
        );
    }

    #[test]
    fn test_csv_empty_bundle() {
        let csv = BundleEncoder::new()
            .encode_csv(&SeriesBundle::default())
            .unwrap();
        assert_eq!(csv, "time:timestamp\n");
    }

    #[test]
    fn test_json_document() {
        let encoder = BundleEncoder::with_instance_id("test-instance".to_string());
        let json = encoder.encode_to_json(&sample_bundle()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["producer"]["name"], "logseries");
        assert_eq!(doc["producer"]["instance_id"], "test-instance");
        assert_eq!(doc["granularity"], "day");
        assert_eq!(doc["index"][2], "2016-01-03");
        assert_eq!(doc["columns"][0], "All_B");
        assert_eq!(doc["series"]["All_A"], serde_json::json!([1, 0, 0]));
    }
}
