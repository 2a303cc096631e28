//! FedAgg - federated heavy-hitter and top-K aggregation simulator
//!
//! Splits a dataset across simulated participants, lets each compute a
//! local statistic, admits only participants whose transmissions were
//! reliable, and merges the admitted statistics into a global result.
//!
//! Exit codes:
//!   0 - Success (including an empty result)
//!   1 - Invalid input, failed run, or I/O error

mod analysis;
mod cli;
mod config;
mod dataset;
mod error;
mod models;
mod participant;
mod partition;
mod pipeline;
mod reliability;
mod report;
mod storage;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, StorageConfig, CONFIG_FILE};
use models::{RunMetadata, RunParameters, RunReport};
use participant::AgentConfig;
use pipeline::{FederatedRun, PipelineConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use storage::{ArtifactStore, FileStore, MemoryStore, StorageBackend};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("FedAgg v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_simulation(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .fedagg.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize thresholds, columns, storage, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete simulation and write the report.
async fn run_simulation(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let (dataset_path, reliability_path) = match (&args.dataset, &args.reliability) {
        (Some(d), Some(r)) => (d.clone(), r.clone()),
        _ => anyhow::bail!("Both --dataset and --reliability are required"),
    };

    // Step 1: Load the inputs
    println!("📥 Loading inputs...");
    let dataset = dataset::load_dataset(&dataset_path)?;
    let reliability = dataset::load_reliability(&reliability_path, &config.reliability)?;

    let agg = &config.aggregation;
    let num_participants = match agg.num_participants {
        Some(n) => n,
        None => {
            let n = reliability::participant_count(&reliability);
            info!("Participant count taken from reliability table: {}", n);
            n
        }
    };

    println!("   Dataset: {} ({} records)", dataset_path.display(), dataset.len());
    println!(
        "   Reliability: {} ({} rows)",
        reliability_path.display(),
        reliability.len()
    );

    // Step 2: Open the artifact store
    let store = open_store(&config.storage)?;
    println!("   Artifact store: {}", store.describe());

    // Step 3: Run the federated pipeline
    println!(
        "\n🔬 Running {} across {} participants...",
        agg.mode, num_participants
    );

    let pipeline_config = PipelineConfig {
        agent: AgentConfig {
            mode: agg.mode,
            item_field: agg.item_field.clone(),
            score_field: agg.score_field.clone(),
            label_fields: agg.label_fields.clone(),
            label_qualifier: agg.qualifier(),
            local_threshold: agg.local_threshold,
            k: agg.k,
        },
        num_participants,
        min_ratio: agg.min_ratio,
        global_threshold: agg.global_threshold,
        concurrency: config.general.concurrency,
        show_progress: !args.quiet,
    };

    let mut run = FederatedRun::new(pipeline_config.clone(), store);
    let outcome = run
        .execute(&dataset, &reliability)
        .await
        .with_context(|| format!("Run ended in state: {}", run.state()))?;

    // Step 4: Optional centralized comparison
    let baseline = if config.report.compare_centralized {
        Some(pipeline::compare_with_centralized(
            &dataset,
            &pipeline_config,
            &outcome.results,
        )?)
    } else {
        None
    };

    // Step 5: Build and save the report
    let duration = start_time.elapsed().as_secs_f64();

    let report = RunReport {
        metadata: RunMetadata {
            dataset: dataset_path.display().to_string(),
            reliability: reliability_path.display().to_string(),
            run_date: Utc::now(),
            records: dataset.len(),
            admitted: outcome.admitted.clone(),
            skipped: outcome.skipped.clone(),
            duration_seconds: duration,
        },
        parameters: RunParameters {
            mode: agg.mode,
            num_participants,
            min_ratio: agg.min_ratio,
            local_threshold: agg.local_threshold,
            global_threshold: agg.global_threshold,
            k: agg.k,
        },
        results: outcome.results.clone(),
        baseline,
    };

    let basename = report::artifact_basename(&reliability_path);
    let written = report::write_report(
        &report,
        &config.report.output_dir,
        &basename,
        config.report.format,
    )?;

    // Print summary
    println!("\n📊 Run Summary:");
    println!("   Total participants: {}", outcome.total_participants);
    println!("   Admitted: {}", outcome.admitted.len());
    if !outcome.skipped.is_empty() {
        println!("   Skipped (missing artifact): {:?}", outcome.skipped);
    }
    println!("   Duration: {:.1}s", duration);

    if report.results.is_empty() {
        println!("\n⚠️  No item met the global criteria; nothing to report.");
        return Ok(());
    }

    println!("\n🏆 {}:", report.parameters.mode);
    for (i, entry) in report.results.iter().enumerate() {
        println!(
            "   {}. {} ({})",
            i + 1,
            entry.label,
            report::format_score(entry.score)
        );
    }

    if config.report.chart && !args.quiet {
        println!();
        print!(
            "{}",
            report::render_chart(&report.results, config.report.chart_width)
        );
    }

    if let Some(ref baseline) = report.baseline {
        println!(
            "\n📐 Versus centralized: precision {:.3} | recall {:.3} | F1 {:.3}",
            baseline.precision, baseline.recall, baseline.f1
        );
    }

    if let Some(path) = written {
        println!("\n✅ Run complete! Report saved to: {}", path.display());
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Build the configured artifact store.
fn open_store(config: &StorageConfig) -> Result<Arc<dyn ArtifactStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => {
            let store = FileStore::create(&config.dir).with_context(|| {
                format!(
                    "Failed to create artifact directory: {}",
                    config.dir.display()
                )
            })?;
            Ok(Arc::new(store))
        }
    }
}
