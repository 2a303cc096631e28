//! Report generation.
//!
//! This module renders a finished run as Markdown or JSON and writes the
//! report artifact next to the other run outputs.

use crate::cli::OutputFormat;
use crate::models::{
    AggregationMode, BaselineComparison, ResultEntry, RunMetadata, RunParameters, RunReport,
};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!(
        "# Federated Aggregation Report: {}\n\n",
        report.parameters.mode
    ));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_parameters_section(&report.parameters));
    output.push_str(&generate_results_section(
        report.parameters.mode,
        &report.results,
    ));

    if let Some(ref baseline) = report.baseline {
        output.push_str(&generate_baseline_section(baseline));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.dataset));
    section.push_str(&format!(
        "- **Reliability Table:** `{}`\n",
        metadata.reliability
    ));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Records:** {}\n", metadata.records));
    section.push_str(&format!(
        "- **Admitted Participants:** {}\n",
        format_ids(&metadata.admitted)
    ));
    if !metadata.skipped.is_empty() {
        section.push_str(&format!(
            "- **Skipped (missing artifact):** {}\n",
            format_ids(&metadata.skipped)
        ));
    }
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the parameters table.
fn generate_parameters_section(parameters: &RunParameters) -> String {
    let mut section = String::new();

    section.push_str("## Parameters\n\n");
    section.push_str("| Parameter | Value |\n");
    section.push_str("|:---|:---:|\n");
    section.push_str(&format!("| Participants | {} |\n", parameters.num_participants));
    section.push_str(&format!("| Minimum ratio | {} |\n", parameters.min_ratio));

    match parameters.mode {
        AggregationMode::HeavyHitters => {
            section.push_str(&format!(
                "| Local threshold | {} |\n",
                parameters.local_threshold
            ));
            section.push_str(&format!(
                "| Global threshold | {} |\n",
                parameters.global_threshold
            ));
        }
        AggregationMode::TopK => {
            section.push_str(&format!("| K | {} |\n", parameters.k));
        }
    }
    section.push('\n');

    section
}

/// Generate the results section.
fn generate_results_section(mode: AggregationMode, results: &[ResultEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Results\n\n");

    if results.is_empty() {
        section.push_str("No item met the global criteria.\n\n");
        return section;
    }

    let score_header = match mode {
        AggregationMode::HeavyHitters => "Count",
        AggregationMode::TopK => "Average Score",
    };

    section.push_str(&format!("| Rank | Label | {} |\n", score_header));
    section.push_str("|:---:|:---|:---:|\n");
    for (i, entry) in results.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            i + 1,
            entry.label.replace('|', "\\|"),
            format_score(entry.score)
        ));
    }
    section.push('\n');

    section
}

/// Generate the centralized comparison section.
fn generate_baseline_section(baseline: &BaselineComparison) -> String {
    let mut section = String::new();

    section.push_str("## Centralized Comparison\n\n");
    section.push_str("| Precision | Recall | F1 |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {:.3} | {:.3} | {:.3} |\n\n",
        baseline.precision, baseline.recall, baseline.f1
    ));

    if !baseline.centralized.is_empty() {
        section.push_str("### Centralized Result\n\n");
        for (i, entry) in baseline.centralized.iter().enumerate() {
            section.push_str(&format!(
                "{}. {} ({})\n",
                i + 1,
                entry.label,
                format_score(entry.score)
            ));
        }
        section.push('\n');
    }

    if !baseline.leakage.is_empty() {
        section.push_str("### Threshold Leakage\n\n");
        section.push_str("| Threshold | Positive Rate | Discovery Rate |\n");
        section.push_str("|:---:|:---:|:---:|\n");
        for point in &baseline.leakage {
            section.push_str(&format!(
                "| {} | {:.3} | {:.3} |\n",
                point.threshold, point.positive_rate, point.discovery_rate
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by fedagg v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Artifact name: `{basename}_aggregated_{metric}.{ext}`.
pub fn report_file_name(basename: &str, mode: AggregationMode, format: OutputFormat) -> String {
    format!(
        "{}_aggregated_{}.{}",
        basename,
        mode.metric_name(),
        format.extension()
    )
}

/// Base name for artifacts, taken from the reliability table's file stem.
pub fn artifact_basename(reliability: &Path) -> String {
    reliability
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("fedagg")
        .to_string()
}

/// Write the report artifact into `dir`.
///
/// Returns `Ok(None)` without writing when the result is empty.
pub fn write_report(
    report: &RunReport,
    dir: &Path,
    basename: &str,
    format: OutputFormat,
) -> Result<Option<PathBuf>> {
    if report.results.is_empty() {
        warn!("Result is empty; no report artifact written");
        return Ok(None);
    }

    let content = match format {
        OutputFormat::Markdown => generate_markdown_report(report),
        OutputFormat::Json => generate_json_report(report)?,
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = dir.join(report_file_name(basename, report.parameters.mode, format));
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    info!("Report written to {}", path.display());
    Ok(Some(path))
}

/// Counts print without decimals, averages with two.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{}", score as i64)
    } else {
        format!("{:.2}", score)
    }
}

fn format_ids(ids: &[u32]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
