use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::RecordSeries;

pub mod batch;
pub mod fit;
pub mod json;

/// One loaded session: the decoded record sequence plus provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Generated session identifier
    pub id: String,

    /// File the session was loaded from
    pub source: PathBuf,

    /// Import timestamp
    pub imported_at: DateTime<Utc>,

    /// Decoded records, temporal order
    pub records: RecordSeries,
}

impl Session {
    pub fn new(source: PathBuf, records: RecordSeries) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            imported_at: Utc::now(),
            records,
        }
    }
}

/// Trait for loading sessions from different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Load a session from the file
    fn import_file(&self, file_path: &Path) -> Result<Session>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Manager for coordinating the available import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(json::JsonImporter::new()),
            Box::new(fit::FitImporter::new()),
        ];
        Self { importers }
    }

    /// Load a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Session> {
        for importer in &self.importers {
            if importer.can_import(file_path) {
                tracing::info!(
                    file = %file_path.display(),
                    format = importer.get_format_name(),
                    "importing session"
                );
                return importer.import_file(file_path);
            }
        }
        anyhow::bail!("No importer found for file: {}", file_path.display());
    }

    /// Collect all importable files from a directory (non-recursive)
    pub fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.importers.iter().any(|imp| imp.can_import(&path)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}
