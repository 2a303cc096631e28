//! Console bar chart of a result.

use super::generator::format_score;
use crate::models::ResultEntry;

const BAR: char = '█';
const MAX_LABEL: usize = 40;

/// Render one bar per entry, scaled so the largest score spans `width`.
pub fn render_chart(entries: &[ResultEntry], width: usize) -> String {
    if entries.is_empty() || width == 0 {
        return String::new();
    }

    let labels: Vec<String> = entries.iter().map(|e| truncate(&e.label)).collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let max_score = entries.iter().map(|e| e.score).fold(0.0_f64, f64::max);

    let mut chart = String::new();
    for (label, entry) in labels.iter().zip(entries) {
        let len = if max_score > 0.0 {
            ((entry.score.max(0.0) / max_score) * width as f64).round() as usize
        } else {
            0
        };
        chart.push_str(&format!(
            "   {:<lw$} │{} {}\n",
            label,
            BAR.to_string().repeat(len),
            format_score(entry.score),
            lw = label_width
        ));
    }

    chart
}

fn truncate(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL {
        return label.to_string();
    }
    let mut short: String = label.chars().take(MAX_LABEL - 1).collect();
    short.push('…');
    short
}
