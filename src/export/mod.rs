use std::path::Path;

use crate::error::{ExportError, FitScrubError, Result};
use crate::models::Record;

pub mod csv;
pub mod json;

/// Supported output formats for corrected series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(FitScrubError::Export(ExportError::UnsupportedFormat {
                format: other.to_string(),
            })),
        }
    }

    /// Infer the format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

/// Write a record series to disk in the requested format
pub fn export_records(records: &[Record], path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => csv::export_records_csv(records, path),
        ExportFormat::Json => json::export_records_json(records, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(ExportFormat::from_str("CSV").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_str("json").unwrap(), ExportFormat::Json);
        assert!(ExportFormat::from_str("pdf").is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out.csv")),
            ExportFormat::Csv
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("out.json")),
            ExportFormat::Json
        );
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Json);
    }
}
