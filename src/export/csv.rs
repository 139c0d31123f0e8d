use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

use crate::error::{ExportError, FitScrubError, Result};
use crate::models::Record;

/// Well-known columns emitted first, in charting order; everything else
/// (annotation keys included) follows alphabetically
const PREFERRED_COLUMNS: &[&str] = &[
    "timestamp",
    "enhanced_speed",
    "stroke_rate",
    "stroke rate",
    "watt",
    "heart_rate",
];

/// Write records as a flat CSV table. The column set is the union of all
/// keys across the series; records missing a column get an empty cell.
pub fn export_records_csv(records: &[Record], path: &Path) -> Result<()> {
    let columns = collect_columns(records);

    let mut writer = csv::Writer::from_path(path).map_err(|e| write_failed(path, e))?;
    writer
        .write_record(&columns)
        .map_err(|e| write_failed(path, e))?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                record
                    .get(column.as_str())
                    .map(cell_value)
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&row).map_err(|e| write_failed(path, e))?;
    }

    writer.flush()?;
    Ok(())
}

fn collect_columns(records: &[Record]) -> Vec<String> {
    let all_keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    let mut columns: Vec<String> = PREFERRED_COLUMNS
        .iter()
        .filter(|column| all_keys.contains(**column))
        .map(|column| column.to_string())
        .collect();
    for key in all_keys {
        if !PREFERRED_COLUMNS.contains(&key) {
            columns.push(key.to_string());
        }
    }
    columns
}

fn cell_value(value: &Value) -> String {
    match value {
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn write_failed(path: &Path, error: impl std::fmt::Display) -> FitScrubError {
    FitScrubError::Export(ExportError::WriteFailed {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record_from_pairs;

    #[test]
    fn test_csv_layout_and_sparse_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut second = record_from_pairs(&[("timestamp", 1.0), ("watt", 181.0)]);
        second.insert("watt_corrected".to_string(), Value::Bool(true));
        let records = vec![
            record_from_pairs(&[("timestamp", 0.0), ("watt", 180.0), ("enhanced_speed", 4.0)]),
            second,
        ];

        export_records_csv(&records, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("timestamp,enhanced_speed,watt"));
        assert!(header.contains("watt_corrected"));

        // Second record has no speed: empty cell, not a missing column
        let second_row = lines.nth(1).unwrap();
        assert!(second_row.contains(",,") || second_row.ends_with(',') || second_row.contains("true"));
    }
}
