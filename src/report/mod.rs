//! Report rendering and artifact output.

mod chart;
mod generator;

pub use chart::render_chart;
pub use generator::{
    artifact_basename, format_score, generate_json_report, generate_markdown_report,
    report_file_name, write_report,
};
