//! JSON session importer
//!
//! Loads a session stored as a JSON array of flat records, the same shape
//! the engine works on. This is the interchange format between the external
//! FIT decoder and the correction pipeline, and what `correct` writes back
//! out.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{ImportFormat, Session};
use crate::fields::{self, FieldKey};
use crate::models::RecordSeries;

pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Session> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open session file: {}", file_path.display()))?;
        let reader = BufReader::new(file);

        let records: RecordSeries = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON records: {}", file_path.display()))?;

        if records.is_empty() {
            anyhow::bail!("Session contains no records: {}", file_path.display());
        }

        let timestamped = records
            .iter()
            .filter(|record| fields::get(record, FieldKey::Time).is_some())
            .count();
        if timestamped == 0 {
            anyhow::bail!(
                "No record carries a timestamp field: {}",
                file_path.display()
            );
        }
        if timestamped < records.len() {
            tracing::warn!(
                missing = records.len() - timestamped,
                "records without timestamps will be skipped by time-based analyses"
            );
        }

        Ok(Session::new(file_path.to_path_buf(), records))
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}
