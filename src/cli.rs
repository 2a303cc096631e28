//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::AggregationMode;
use crate::storage::StorageBackend;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// FedAgg - federated heavy-hitter and top-K aggregation simulator
///
/// Partitions a dataset across simulated participants, admits the ones
/// whose transmissions were reliable enough, and merges their local
/// statistics into one global result.
///
/// Examples:
///   fedagg --dataset items.csv --reliability 0.5_fa_ns3_results.csv
///   fedagg --dataset spotify_songs.csv --reliability results.csv --mode top-k -k 3
///   fedagg --dataset items.json --reliability results.csv --store-dir client_models
///   fedagg --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dataset to partition (CSV with header row, or JSON array)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub dataset: Option<PathBuf>,

    /// Reliability table with per-participant packet counters
    ///
    /// Its file stem names the report artifact.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub reliability: Option<PathBuf>,

    /// Statistic to compute
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<AggregationMode>,

    /// Number of participants
    ///
    /// Defaults to the number of distinct participants in the reliability table.
    #[arg(short, long, value_name = "COUNT")]
    pub participants: Option<usize>,

    /// Minimum received/sent packet ratio for admission
    #[arg(long, value_name = "RATIO", env = "FEDAGG_MIN_RATIO")]
    pub min_ratio: Option<f64>,

    /// Count threshold each participant applies before reporting
    #[arg(long, value_name = "COUNT")]
    pub local_threshold: Option<u64>,

    /// Count threshold applied to the aggregated counts
    #[arg(long, value_name = "COUNT")]
    pub global_threshold: Option<u64>,

    /// Length of local and global rankings
    #[arg(short = 'k', long = "top", value_name = "K")]
    pub k: Option<usize>,

    /// Field holding the item value (heavy-hitter mode)
    #[arg(long, value_name = "FIELD")]
    pub item_field: Option<String>,

    /// Field holding the numeric score (top-K mode)
    #[arg(long, value_name = "FIELD")]
    pub score_field: Option<String>,

    /// Fields joined into a ranking label (comma-separated)
    ///
    /// Example: --label-fields track_name,track_artist
    #[arg(long, value_name = "FIELDS", value_delimiter = ',')]
    pub label_fields: Option<Vec<String>>,

    /// Field appended to each label in parentheses (empty string disables it)
    ///
    /// Default: playlist_genre, giving labels like "Song - Artist (pop)"
    #[arg(long, value_name = "FIELD")]
    pub label_qualifier: Option<String>,

    /// Artifact storage backend
    #[arg(long, value_name = "BACKEND")]
    pub store: Option<StorageBackend>,

    /// Directory for per-participant artifacts (implies --store file)
    #[arg(long, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// Report format
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Directory the report artifact is written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not print the console bar chart
    #[arg(long)]
    pub no_chart: bool,

    /// Also compute the statistic centrally and report precision/recall
    #[arg(long)]
    pub compare_centralized: bool,

    /// Number of shards processed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fedagg.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .fedagg.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension for report artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        for (name, path) in [("Dataset", &self.dataset), ("Reliability table", &self.reliability)] {
            match path {
                Some(p) if !p.is_file() => {
                    return Err(format!("{} file does not exist: {}", name, p.display()))
                }
                None => return Err(format!("{} file is required", name)),
                _ => {}
            }
        }

        if self.participants == Some(0) {
            return Err("Number of participants must be greater than 0".to_string());
        }

        if let Some(ratio) = self.min_ratio {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err("Minimum ratio must be a non-negative number".to_string());
            }
        }

        if self.local_threshold == Some(0) || self.global_threshold == Some(0) {
            return Err("Thresholds must be at least 1".to_string());
        }

        if self.k == Some(0) {
            return Err("K must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref fields) = self.label_fields {
            if fields.iter().all(|f| f.trim().is_empty()) {
                return Err("At least one label field is required".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
