//! FIT session importer
//!
//! Binary FIT decoding is delegated entirely to the external `fitparser`
//! crate; this module only maps the decoded record messages into the flat
//! record shape the engine consumes. Absolute device timestamps are rebased
//! to seconds elapsed since the first record.

use anyhow::{Context, Result};
use fitparser::profile::MesgNum;
use fitparser::FitDataRecord;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{ImportFormat, Session};
use crate::models::Record;

pub struct FitImporter;

impl FitImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FitImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for FitImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("fit"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Session> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open FIT file: {}", file_path.display()))?;
        let mut reader = BufReader::new(file);

        let decoded: Vec<FitDataRecord> = fitparser::from_reader(&mut reader)
            .map_err(|e| anyhow::anyhow!("Failed to parse FIT file records: {:?}", e))?;

        let mut records: Vec<Record> = decoded
            .iter()
            .filter(|message| message.kind() == MesgNum::Record)
            .map(map_record_message)
            .collect();

        if records.is_empty() {
            anyhow::bail!("FIT file contains no record messages: {}", file_path.display());
        }

        rebase_timestamps(&mut records);
        tracing::info!(
            file = %file_path.display(),
            records = records.len(),
            "decoded FIT session"
        );

        Ok(Session::new(file_path.to_path_buf(), records))
    }

    fn get_format_name(&self) -> &'static str {
        "FIT"
    }
}

/// Flatten one decoded record message into a name→value map, keeping the
/// decoder's field names so the spelling-variant resolver sees them as-is
fn map_record_message(message: &FitDataRecord) -> Record {
    let mut record = Record::new();
    for field in message.fields() {
        if let Some(value) = numeric_value(field.value()) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                record.insert(field.name().to_string(), Value::Number(number));
            }
        }
    }
    record
}

/// Device timestamps are absolute; the engine wants seconds since start
fn rebase_timestamps(records: &mut [Record]) {
    let first = records
        .iter()
        .find_map(|record| record.get("timestamp").and_then(Value::as_f64));
    let first = match first {
        Some(first) => first,
        None => return,
    };
    for record in records.iter_mut() {
        if let Some(absolute) = record.get("timestamp").and_then(Value::as_f64) {
            if let Some(number) = serde_json::Number::from_f64(absolute - first) {
                record.insert("timestamp".to_string(), Value::Number(number));
            }
        }
    }
}

fn numeric_value(value: &fitparser::Value) -> Option<f64> {
    use fitparser::Value as Fit;
    match value {
        Fit::Timestamp(timestamp) => Some(timestamp.timestamp() as f64),
        Fit::Byte(v) => Some(f64::from(*v)),
        Fit::SInt8(v) => Some(f64::from(*v)),
        Fit::UInt8(v) => Some(f64::from(*v)),
        Fit::SInt16(v) => Some(f64::from(*v)),
        Fit::UInt16(v) => Some(f64::from(*v)),
        Fit::SInt32(v) => Some(f64::from(*v)),
        Fit::UInt32(v) => Some(f64::from(*v)),
        Fit::SInt64(v) => Some(*v as f64),
        Fit::UInt64(v) => Some(*v as f64),
        Fit::UInt8z(v) => Some(f64::from(*v)),
        Fit::UInt16z(v) => Some(f64::from(*v)),
        Fit::UInt32z(v) => Some(f64::from(*v)),
        Fit::UInt64z(v) => Some(*v as f64),
        Fit::Float32(v) => Some(f64::from(*v)),
        Fit::Float64(v) => Some(*v),
        Fit::Enum(_) | Fit::String(_) | Fit::Array(_) => None,
    }
}
