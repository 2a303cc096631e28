//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fedagg.toml` files.

use crate::cli::OutputFormat;
use crate::models::AggregationMode;
use crate::storage::StorageBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".fedagg.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Reliability table column names.
    #[serde(default)]
    pub reliability: ReliabilityConfig,

    /// Artifact storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Number of shards processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// What to compute and how to filter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Heavy hitters or top-K ranking.
    #[serde(default)]
    pub mode: AggregationMode,

    /// Number of participants. Taken from the reliability table when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_participants: Option<usize>,

    /// Minimum received/sent ratio for admission.
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,

    /// Count threshold applied by each participant.
    #[serde(default = "default_threshold")]
    pub local_threshold: u64,

    /// Count threshold applied to the aggregated counts.
    #[serde(default = "default_threshold")]
    pub global_threshold: u64,

    /// Length of local and global rankings.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Field holding the item value.
    #[serde(default = "default_item_field")]
    pub item_field: String,

    /// Field holding the numeric score.
    #[serde(default = "default_score_field")]
    pub score_field: String,

    /// Fields joined into a ranking label.
    #[serde(default = "default_label_fields")]
    pub label_fields: Vec<String>,

    /// Field appended to the label in parentheses. Empty disables it.
    #[serde(default = "default_label_qualifier")]
    pub label_qualifier: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::default(),
            num_participants: None,
            min_ratio: default_min_ratio(),
            local_threshold: default_threshold(),
            global_threshold: default_threshold(),
            k: default_k(),
            item_field: default_item_field(),
            score_field: default_score_field(),
            label_fields: default_label_fields(),
            label_qualifier: default_label_qualifier(),
        }
    }
}

fn default_min_ratio() -> f64 {
    0.25
}

fn default_threshold() -> u64 {
    2
}

fn default_k() -> usize {
    3
}

fn default_item_field() -> String {
    "item".to_string()
}

fn default_score_field() -> String {
    "track_popularity".to_string()
}

fn default_label_fields() -> Vec<String> {
    vec!["track_name".to_string(), "track_artist".to_string()]
}

fn default_label_qualifier() -> String {
    "playlist_genre".to_string()
}

impl AggregationConfig {
    /// The label qualifier field, `None` when disabled.
    pub fn qualifier(&self) -> Option<String> {
        let field = self.label_qualifier.trim();
        (!field.is_empty()).then(|| field.to_string())
    }
}

/// Column names of the reliability table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default = "default_client_column")]
    pub client_column: String,

    #[serde(default = "default_sent_column")]
    pub sent_column: String,

    #[serde(default = "default_received_column")]
    pub received_column: String,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            client_column: default_client_column(),
            sent_column: default_sent_column(),
            received_column: default_received_column(),
        }
    }
}

fn default_client_column() -> String {
    "Client".to_string()
}

fn default_sent_column() -> String {
    "Tx_Packets".to_string()
}

fn default_received_column() -> String {
    "Rx_Packets".to_string()
}

/// Where participants' artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("client_models")
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Directory the report artifact is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Print a bar chart of the result to the console.
    #[serde(default = "default_true")]
    pub chart: bool,

    /// Width of the longest chart bar, in characters.
    #[serde(default = "default_chart_width")]
    pub chart_width: usize,

    /// Also compute the statistic centrally and compare.
    #[serde(default)]
    pub compare_centralized: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            output_dir: default_output_dir(),
            chart: true,
            chart_width: default_chart_width(),
            compare_centralized: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_chart_width() -> usize {
    40
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        let agg = &mut self.aggregation;

        if let Some(mode) = args.mode {
            agg.mode = mode;
        }
        if let Some(n) = args.participants {
            agg.num_participants = Some(n);
        }
        if let Some(ratio) = args.min_ratio {
            agg.min_ratio = ratio;
        }
        if let Some(t) = args.local_threshold {
            agg.local_threshold = t;
        }
        if let Some(t) = args.global_threshold {
            agg.global_threshold = t;
        }
        if let Some(k) = args.k {
            agg.k = k;
        }
        if let Some(ref field) = args.item_field {
            agg.item_field = field.clone();
        }
        if let Some(ref field) = args.score_field {
            agg.score_field = field.clone();
        }
        if let Some(ref fields) = args.label_fields {
            agg.label_fields = fields.clone();
        }
        if let Some(ref field) = args.label_qualifier {
            agg.label_qualifier = field.clone();
        }

        // Storage settings
        if let Some(backend) = args.store {
            self.storage.backend = backend;
        }
        if let Some(ref dir) = args.store_dir {
            self.storage.dir = dir.clone();
            // A directory only makes sense for the file backend
            if args.store.is_none() {
                self.storage.backend = StorageBackend::File;
            }
        }

        // Report settings
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref dir) = args.output_dir {
            self.report.output_dir = dir.clone();
        }
        if args.no_chart {
            self.report.chart = false;
        }
        if args.compare_centralized {
            self.report.compare_centralized = true;
        }

        // General settings
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
