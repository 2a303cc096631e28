//! Simulated participants.
//!
//! A participant holds one shard and reports a single local statistic
//! computed from it. The agent is stateless and cheap to clone, so one
//! copy can be moved into each worker task.

pub mod local;

pub use local::{compute_local_frequency, compute_local_heavy_hitters, compute_local_top_k};

use crate::error::Result;
use crate::models::{AggregationMode, LocalStatistic, Shard};
use tracing::debug;

/// What every participant computes.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub mode: AggregationMode,
    /// Field holding the item value (heavy-hitter mode).
    pub item_field: String,
    /// Field holding the numeric score (top-K mode).
    pub score_field: String,
    /// Fields joined into the label (top-K mode).
    pub label_fields: Vec<String>,
    /// Field appended to the label in parentheses (top-K mode).
    pub label_qualifier: Option<String>,
    /// Local pre-filter threshold (heavy-hitter mode).
    pub local_threshold: u64,
    /// List length (top-K mode).
    pub k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::HeavyHitters,
            item_field: "item".to_string(),
            score_field: "score".to_string(),
            label_fields: vec!["item".to_string()],
            label_qualifier: None,
            local_threshold: 2,
            k: 3,
        }
    }
}

/// Computes the configured local statistic for a shard.
#[derive(Debug, Clone)]
pub struct ParticipantAgent {
    config: AgentConfig,
}

impl ParticipantAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Compute the local statistic for one shard.
    pub fn compute(&self, shard: &Shard) -> Result<LocalStatistic> {
        let statistic = match self.config.mode {
            AggregationMode::HeavyHitters => LocalStatistic::Counts(compute_local_heavy_hitters(
                shard,
                &self.config.item_field,
                self.config.local_threshold,
            )?),
            AggregationMode::TopK => LocalStatistic::Ranked(compute_local_top_k(
                shard,
                self.config.k,
                &self.config.score_field,
                &self.config.label_fields,
                self.config.label_qualifier.as_deref(),
            )?),
        };

        debug!(
            "Participant {} reported {} entries from {} records",
            shard.participant,
            statistic.len(),
            shard.len()
        );

        Ok(statistic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, Record};

    #[test]
    fn test_agent_dispatches_on_mode() {
        let shard = Shard {
            participant: 1,
            offset: 0,
            records: Dataset::from_items("item", &["a", "a", "b"])
                .records()
                .to_vec(),
        };

        let agent = ParticipantAgent::new(AgentConfig::default());
        match agent.compute(&shard).unwrap() {
            LocalStatistic::Counts(counts) => {
                assert_eq!(counts.len(), 1);
                assert_eq!(counts.get("a"), Some(2));
            }
            other => panic!("expected counts, got {:?}", other),
        }
    }

    #[test]
    fn test_agent_top_k() {
        let shard = Shard {
            participant: 1,
            offset: 0,
            records: vec![
                Record::from_pairs([("item", "x"), ("score", "3")]),
                Record::from_pairs([("item", "y"), ("score", "9")]),
            ],
        };
        let agent = ParticipantAgent::new(AgentConfig {
            mode: AggregationMode::TopK,
            k: 1,
            ..AgentConfig::default()
        });

        match agent.compute(&shard).unwrap() {
            LocalStatistic::Ranked(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].label, "y");
            }
            other => panic!("expected ranked list, got {:?}", other),
        }
    }
}
