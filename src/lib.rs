// Library interface for the FitScrub modules
// This allows integration tests to access the core functionality

pub mod config;
pub mod correction;
pub mod error;
pub mod export;
pub mod fields;
pub mod import;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod stats;
pub mod zones;

// Re-export commonly used types for convenience
pub use config::CorrectionSettings;
pub use correction::{correct, CorrectionMethod, NoiseCorrector};
pub use error::{FitScrubError, Result};
pub use fields::FieldKey;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::{calculate_filter_improvement_metrics, normalized_power, ImprovementReport};
pub use models::{
    CorrectionOutcome, CorrectionStats, Record, RecordSeries, Zone, ZoneDistributionItem,
};
pub use zones::{zone_distribution, ZoneTable};
