//! Centralized reference computation.
//!
//! The whole dataset is treated as a single participant with no local
//! pre-filter, and the federated result is scored against it.

use super::PipelineConfig;
use crate::analysis::{
    aggregate_counts, extract_heavy_hitters, f1_score, precision, recall, threshold_leakage,
};
use crate::error::Result;
use crate::models::{AggregationMode, BaselineComparison, Dataset, ResultEntry, Shard};
use crate::participant::{compute_local_frequency, compute_local_top_k};
use tracing::info;

/// Compute the statistic centrally and compare it with `federated`.
pub fn compare_with_centralized(
    dataset: &Dataset,
    config: &PipelineConfig,
    federated: &[ResultEntry],
) -> Result<BaselineComparison> {
    let whole = Shard {
        participant: 1,
        offset: 0,
        records: dataset.records().to_vec(),
    };
    let agent = &config.agent;

    let (centralized, leakage): (Vec<ResultEntry>, _) = match agent.mode {
        AggregationMode::HeavyHitters => {
            let counts = compute_local_frequency(&whole, &agent.item_field)?;
            let signal: Vec<f64> = counts.entries.iter().map(|e| e.count as f64).collect();
            let leakage = threshold_leakage(
                &signal,
                &[agent.local_threshold as f64, config.global_threshold as f64],
            );

            let aggregate = aggregate_counts(&[(whole.participant, counts)]);
            let hitters = extract_heavy_hitters(&aggregate, config.global_threshold)?
                .into_iter()
                .map(|h| ResultEntry::new(h.item, h.count as f64))
                .collect();
            (hitters, leakage)
        }
        AggregationMode::TopK => {
            let top = compute_local_top_k(
                &whole,
                agent.k,
                &agent.score_field,
                &agent.label_fields,
                agent.label_qualifier.as_deref(),
            )?
                .into_iter()
                .map(|e| ResultEntry::new(e.label, e.score))
                .collect();
            (top, Vec::new())
        }
    };

    let truth: Vec<&str> = centralized.iter().map(|r| r.label.as_str()).collect();
    let predicted: Vec<&str> = federated.iter().map(|r| r.label.as_str()).collect();

    let comparison = BaselineComparison {
        precision: precision(&truth, &predicted),
        recall: recall(&truth, &predicted),
        f1: f1_score(&truth, &predicted),
        centralized,
        leakage,
    };

    info!(
        "Centralized comparison: precision {:.3}, recall {:.3}, F1 {:.3}",
        comparison.precision, comparison.recall, comparison.f1
    );

    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::participant::AgentConfig;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_heavy_hitter_baseline() {
        // Every item appears twice overall but never twice in one half
        let dataset = Dataset::from_items("item", &["a", "b", "c", "a", "b", "c"]);
        let config = PipelineConfig {
            num_participants: 2,
            ..PipelineConfig::default()
        };

        let comparison =
            compare_with_centralized(&dataset, &config, &[ResultEntry::new("a", 2.0)]).unwrap();

        assert_eq!(comparison.centralized.len(), 3);
        assert_eq!(comparison.centralized[0].label, "a");
        assert!(close(comparison.precision, 1.0));
        assert!(close(comparison.recall, 1.0 / 3.0));
        assert!(close(comparison.f1, 0.5));

        assert_eq!(comparison.leakage.len(), 2);
        assert!(close(comparison.leakage[0].positive_rate, 1.0));
        assert!(close(comparison.leakage[0].discovery_rate, 0.5));
    }

    #[test]
    fn test_empty_federated_result_scores_zero() {
        let dataset = Dataset::from_items("item", &["a", "a"]);
        let comparison =
            compare_with_centralized(&dataset, &PipelineConfig::default(), &[]).unwrap();

        assert_eq!(comparison.centralized, vec![ResultEntry::new("a", 2.0)]);
        assert!(close(comparison.precision, 0.0));
        assert!(close(comparison.recall, 0.0));
        assert!(close(comparison.f1, 0.0));
    }

    #[test]
    fn test_top_k_baseline() {
        let dataset = Dataset::new(vec![
            Record::from_pairs([("item", "x"), ("score", "10")]),
            Record::from_pairs([("item", "y"), ("score", "30")]),
            Record::from_pairs([("item", "z"), ("score", "20")]),
        ]);
        let config = PipelineConfig {
            agent: AgentConfig {
                mode: AggregationMode::TopK,
                k: 2,
                ..AgentConfig::default()
            },
            ..PipelineConfig::default()
        };

        let federated = [ResultEntry::new("y", 30.0), ResultEntry::new("x", 10.0)];
        let comparison = compare_with_centralized(&dataset, &config, &federated).unwrap();

        assert_eq!(
            comparison.centralized,
            vec![ResultEntry::new("y", 30.0), ResultEntry::new("z", 20.0)]
        );
        assert!(close(comparison.precision, 0.5));
        assert!(comparison.leakage.is_empty());
    }
}
