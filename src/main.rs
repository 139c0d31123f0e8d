use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use fitscrub::config::CorrectionSettings;
use fitscrub::correction::{self, CorrectionMethod};
use fitscrub::export::{self, ExportFormat};
use fitscrub::fields::FieldKey;
use fitscrub::import::batch::{BatchConfig, BatchCorrector};
use fitscrub::import::ImportManager;
use fitscrub::logging::{init_logging, LogConfig};
use fitscrub::metrics;
use fitscrub::zones::{zone_distribution, ZoneTable};

/// FitScrub - Workout Telemetry Cleaning CLI
///
/// Detects and repairs transient sensor dropouts in recorded workout
/// telemetry, computes zone distributions, and reports how much a
/// correction pass improved the data.
#[derive(Parser)]
#[command(name = "fitscrub")]
#[command(version = "0.1.0")]
#[command(about = "Workout telemetry cleaning CLI", long_about = None)]
struct Cli {
    /// Sets a custom settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct sensor dropouts in a session
    Correct {
        /// Input session (JSON record array or FIT file)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the corrected series (json or csv)
        #[arg(short, long)]
        output: PathBuf,

        /// Correction method (threshold, moving-average, correlation,
        /// kalman, contextual, auto)
        #[arg(short, long, default_value = "auto")]
        method: String,
    },

    /// Compute time-in-zone distribution for a field
    Zones {
        /// Input session (JSON or FIT)
        #[arg(short, long)]
        input: PathBuf,

        /// Field to bucket (watt, stroke_rate, heart_rate)
        #[arg(short, long, default_value = "watt")]
        field: String,

        /// Zone table file (TOML)
        #[arg(short, long)]
        zones: PathBuf,
    },

    /// Compare an original session against its corrected output
    Compare {
        /// Original session file
        #[arg(long)]
        original: PathBuf,

        /// Corrected session file
        #[arg(long)]
        corrected: PathBuf,
    },

    /// Correct every session in a directory in parallel
    Batch {
        /// Directory of session files
        #[arg(short, long)]
        dir: PathBuf,

        /// Correction method
        #[arg(short, long, default_value = "auto")]
        method: String,

        /// Worker threads (defaults to CPU count)
        #[arg(short, long)]
        threads: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose))?;

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Correct {
            input,
            output,
            method,
        } => run_correct(&settings, &input, &output, &method),
        Commands::Zones {
            input,
            field,
            zones,
        } => run_zones(&input, &field, &zones),
        Commands::Compare {
            original,
            corrected,
        } => run_compare(&settings, &original, &corrected),
        Commands::Batch {
            dir,
            method,
            threads,
        } => run_batch(&settings, &dir, &method, threads),
    }
}

fn load_settings(path: Option<&std::path::Path>) -> Result<CorrectionSettings> {
    match path {
        Some(path) => CorrectionSettings::load_from_file(path),
        None => Ok(CorrectionSettings::default()),
    }
}

fn parse_method(method: &str) -> Result<CorrectionMethod> {
    method
        .parse::<CorrectionMethod>()
        .map_err(|e| anyhow::anyhow!(e))
}

fn run_correct(
    settings: &CorrectionSettings,
    input: &PathBuf,
    output: &PathBuf,
    method: &str,
) -> Result<()> {
    let mut settings = settings.clone();
    settings.method = parse_method(method)?;

    let session = ImportManager::new().import_file(input)?;
    println!(
        "{}",
        format!(
            "Correcting {} ({} records, method: {})...",
            input.display(),
            session.records.len(),
            settings.method.resolve()
        )
        .blue()
        .bold()
    );

    let outcome = correction::correct(&session.records, &settings);

    let format = ExportFormat::from_path(output);
    export::export_records(&outcome.records, output, format)
        .with_context(|| format!("Failed to write corrected series to {}", output.display()))?;

    let stats = &outcome.stats;
    println!(
        "  Points: {}   Noisy: {}   Quality: {:.1}%",
        stats.total_points, stats.noisy_points, stats.quality_score
    );
    for (field, count) in &stats.fixed_fields {
        println!("  {}: {} fixes", field, count);
    }
    if let Some(phases) = &stats.phase_analysis {
        for (phase, count) in phases {
            println!("  {}: {} fixes", phase.as_str(), count);
        }
    }
    println!("{}", format!("✓ Wrote {}", output.display()).green());
    Ok(())
}

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    name: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Duration (s)")]
    duration: String,
    #[tabled(rename = "Share")]
    percentage: String,
}

fn run_zones(input: &PathBuf, field: &str, zones_path: &PathBuf) -> Result<()> {
    let field = FieldKey::parse(field)
        .ok_or_else(|| anyhow::anyhow!("Unknown field: {}", field))?;
    let table = ZoneTable::load_from_file(zones_path)?;
    if !table.is_disjoint() {
        eprintln!(
            "{}",
            "Warning: zone table overlaps; overlapping time is counted in every matching zone"
                .yellow()
        );
    }

    let session = ImportManager::new().import_file(input)?;
    let distribution = zone_distribution(&session.records, field, &table.zones);

    let rows: Vec<ZoneRow> = distribution
        .iter()
        .map(|item| ZoneRow {
            name: item.zone.name.clone(),
            range: if item.zone.max.is_finite() {
                format!("{:.0}-{:.0}", item.zone.min, item.zone.max)
            } else {
                format!("{:.0}+", item.zone.min)
            },
            duration: format!("{:.0}", item.duration),
            percentage: format!("{:.1}%", item.percentage),
        })
        .collect();

    if let Some(name) = &table.name {
        println!("{}", name.bold());
    }
    println!("{}", Table::new(rows));
    Ok(())
}

fn run_compare(
    settings: &CorrectionSettings,
    original: &PathBuf,
    corrected: &PathBuf,
) -> Result<()> {
    let manager = ImportManager::new();
    let original_session = manager.import_file(original)?;
    let corrected_session = manager.import_file(corrected)?;

    let targets = settings.resolved_targets();
    let report = metrics::calculate_filter_improvement_metrics(
        &original_session.records,
        &corrected_session.records,
        &targets,
    )
    .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!(
        "{}",
        format!("Improvement over {} points", report.total_points)
            .blue()
            .bold()
    );
    for field in &report.fields {
        println!("  {}", field.field.bold());
        println!("    corrected points: {}", field.corrected_points);
        println!(
            "    dropouts: {} → {} ({:.1}% reduction)",
            field.dropouts_before, field.dropouts_after, field.dropout_reduction_percent
        );
        println!(
            "    mean: {:.1} → {:.1}",
            field.mean_before, field.mean_after
        );
    }
    Ok(())
}

fn run_batch(
    settings: &CorrectionSettings,
    dir: &PathBuf,
    method: &str,
    threads: Option<usize>,
) -> Result<()> {
    let mut settings = settings.clone();
    settings.method = parse_method(method)?;

    let config = BatchConfig {
        num_threads: threads,
        ..Default::default()
    };
    let corrector = BatchCorrector::with_config(settings, config);
    let (results, summary) = corrector.run_directory(dir)?;

    for result in &results {
        if let Some(error) = &result.error {
            eprintln!(
                "{}",
                format!("✗ {}: {}", result.file_path.display(), error).red()
            );
        }
    }
    println!("{}", summary.to_string_pretty().green());
    Ok(())
}
