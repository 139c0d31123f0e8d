//! Unified error hierarchy for FitScrub
//!
//! Provides a structured error type system with context preservation and
//! integration with the tracing system. The correction strategies themselves
//! are total over well-formed input: missing or degenerate data yields
//! neutral results, not errors. Errors here surface caller misuse (shape
//! mismatches, bad configuration) and IO/parse failures.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all FitScrub operations
#[derive(Debug, Error)]
pub enum FitScrubError {
    /// Session decoding/loading errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Before/after comparison errors
    #[error("Comparison error: {0}")]
    Comparison(#[from] ComparisonError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Session loading errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Unsupported input format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// Session has no usable records
    #[error("Empty session: {reason}")]
    EmptySession { reason: String },

    /// Record is missing a required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Unsupported output format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Write failed
    #[error("Export failed to {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Calculation errors for top-level statistics calls
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Insufficient data for calculation
    #[error("Insufficient data for {calculation}: {reason}")]
    InsufficientData { calculation: String, reason: String },

    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },
}

/// Comparison errors — caller misuse, not data-quality issues
#[derive(Debug, Error)]
pub enum ComparisonError {
    /// Original and filtered series have different lengths
    #[error("Series length mismatch: original {original_length}, filtered {filtered_length}")]
    LengthMismatch {
        original_length: usize,
        filtered_length: usize,
    },
}

/// Result type alias for FitScrub operations
pub type Result<T> = std::result::Result<T, FitScrubError>;

impl FitScrubError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FitScrubError::Import(ImportError::FileNotFound { .. }) => ErrorSeverity::Warning,
            FitScrubError::Import(ImportError::EmptySession { .. }) => ErrorSeverity::Warning,
            FitScrubError::Calculation(_) => ErrorSeverity::Warning,
            FitScrubError::Comparison(_) => ErrorSeverity::Warning,
            FitScrubError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            FitScrubError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find session file: {}", path.display())
            }
            FitScrubError::Comparison(ComparisonError::LengthMismatch {
                original_length,
                filtered_length,
            }) => {
                format!(
                    "Cannot compare series of different lengths ({} vs {}). \
                     Pass the corrected output of the same session.",
                    original_length, filtered_length
                )
            }
            FitScrubError::Calculation(CalculationError::InsufficientData {
                calculation, ..
            }) => {
                format!(
                    "Not enough data to calculate {}. Please ensure the session has complete data.",
                    calculation
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical | ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
