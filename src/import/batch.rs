//! Parallel batch correction across sessions using rayon
//!
//! Sessions are independent: each one is loaded, corrected, and summarized
//! on its own worker with no shared mutable state. Parallelism never
//! crosses into a single session's record sequence — the correction pass
//! itself is strictly sequential by design.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::ImportManager;
use crate::config::CorrectionSettings;
use crate::correction;
use crate::models::CorrectionOutcome;

/// Configuration for batch correction runs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of worker threads; None uses the rayon default
    pub num_threads: Option<usize>,

    /// Show a progress bar
    pub show_progress: bool,

    /// Keep going when a single session fails
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            show_progress: true,
            continue_on_error: true,
        }
    }
}

/// Result of one session within a batch
#[derive(Debug)]
pub struct SessionResult {
    pub file_path: PathBuf,
    pub outcome: Option<CorrectionOutcome>,
    pub error: Option<String>,
}

/// Summary of a whole batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_points: usize,
    pub total_noisy_points: usize,
}

impl BatchSummary {
    pub fn to_string_pretty(&self) -> String {
        format!(
            "Batch Correction Summary\n  \
             Total Sessions: {}\n  \
             Successful: {}\n  \
             Failed: {}\n  \
             Total Points: {}\n  \
             Noisy Points: {}",
            self.total_files, self.successful, self.failed, self.total_points,
            self.total_noisy_points
        )
    }
}

/// Batch runner: corrects every importable session under a directory
pub struct BatchCorrector {
    pub config: BatchConfig,
    settings: CorrectionSettings,
}

impl BatchCorrector {
    pub fn new(settings: CorrectionSettings) -> Self {
        Self::with_config(settings, BatchConfig::default())
    }

    pub fn with_config(settings: CorrectionSettings, config: BatchConfig) -> Self {
        Self { config, settings }
    }

    /// Correct all importable sessions in a directory
    pub fn run_directory(&self, dir_path: &Path) -> Result<(Vec<SessionResult>, BatchSummary)> {
        let manager = ImportManager::new();
        let files = manager.collect_importable_files(dir_path)?;
        if files.is_empty() {
            anyhow::bail!("No importable sessions found in {}", dir_path.display());
        }
        self.run_files(&files)
    }

    /// Correct an explicit list of session files in parallel
    pub fn run_files(&self, files: &[PathBuf]) -> Result<(Vec<SessionResult>, BatchSummary)> {
        info!(sessions = files.len(), "starting batch correction");

        if let Some(num_threads) = self.config.num_threads {
            // Pool may already exist when the caller ran a batch before;
            // that's fine, rayon keeps the first configuration
            let _ = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global();
        }

        let progress = if self.config.show_progress {
            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(bar)
        } else {
            None
        };

        let results: Vec<SessionResult> = files
            .par_iter()
            .map(|file_path| {
                let result = self.correct_one(file_path);
                if let Some(bar) = &progress {
                    bar.inc(1);
                }
                result
            })
            .collect();

        if let Some(bar) = progress {
            bar.finish_with_message("Complete");
        }

        let mut summary = BatchSummary {
            total_files: files.len(),
            ..Default::default()
        };
        for result in &results {
            match &result.outcome {
                Some(outcome) => {
                    summary.successful += 1;
                    summary.total_points += outcome.stats.total_points;
                    summary.total_noisy_points += outcome.stats.noisy_points;
                }
                None => summary.failed += 1,
            }
        }

        if summary.failed > 0 && !self.config.continue_on_error {
            anyhow::bail!("{} of {} sessions failed", summary.failed, summary.total_files);
        }

        Ok((results, summary))
    }

    fn correct_one(&self, file_path: &Path) -> SessionResult {
        let manager = ImportManager::new();
        match manager.import_file(file_path) {
            Ok(session) => {
                let outcome = correction::correct(&session.records, &self.settings);
                SessionResult {
                    file_path: file_path.to_path_buf(),
                    outcome: Some(outcome),
                    error: None,
                }
            }
            Err(error) => {
                warn!(file = %file_path.display(), %error, "session failed");
                SessionResult {
                    file_path: file_path.to_path_buf(),
                    outcome: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_session(dir: &Path, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_batch_over_directory() {
        let dir = tempfile::tempdir().unwrap();
        let session = r#"[
            {"timestamp": 0, "enhanced_speed": 4.0, "watt": 200},
            {"timestamp": 1, "enhanced_speed": 4.0, "watt": 0},
            {"timestamp": 2, "enhanced_speed": 4.0, "watt": 201}
        ]"#;
        write_session(dir.path(), "a.json", session);
        write_session(dir.path(), "b.json", session);
        write_session(dir.path(), "broken.json", "not json");

        let config = BatchConfig {
            show_progress: false,
            ..Default::default()
        };
        let corrector = BatchCorrector::with_config(CorrectionSettings::default(), config);
        let (results, summary) = corrector.run_directory(dir.path()).unwrap();

        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_noisy_points, 2);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let corrector = BatchCorrector::new(CorrectionSettings::default());
        assert!(corrector.run_directory(dir.path()).is_err());
    }
}
