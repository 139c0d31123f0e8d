use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{ExportError, FitScrubError, Result};
use crate::models::Record;

/// Write records as a pretty-printed JSON array, the same shape the JSON
/// importer reads back
pub fn export_records_json(records: &[Record], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, records).map_err(|e| {
        FitScrubError::Export(ExportError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })
}
