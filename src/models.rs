//! Data models for the aggregation simulator.
//!
//! This module contains the core data structures shared by the pipeline
//! stages: records and shards, local statistics, reliability counters and
//! the final report.

use crate::analysis::LeakagePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a simulated participant, 1-based.
pub type ParticipantId = u32;

/// Which statistic the participants compute and the coordinator merges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// Item frequencies, filtered locally then globally by count threshold
    #[default]
    HeavyHitters,
    /// Per-participant top-K lists, averaged into a global ranking
    TopK,
}

impl AggregationMode {
    /// Metric name used in artifact file names.
    pub fn metric_name(&self) -> &'static str {
        match self {
            AggregationMode::HeavyHitters => "heavy_hitters",
            AggregationMode::TopK => "ranking",
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMode::HeavyHitters => write!(f, "Heavy hitters"),
            AggregationMode::TopK => write!(f, "Top-K ranking"),
        }
    }
}

/// A single dataset row. Absent fields are simply not in the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Build a record from `(field, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Record with a single field, handy for plain item streams.
    pub fn single(field: &str, value: &str) -> Self {
        Self::from_pairs([(field, value)])
    }

    /// Set a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Get a field value, `None` when absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Whether the record carries the field.
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// An ordered, immutable sequence of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Dataset of single-field records, one per item.
    pub fn from_items<S: AsRef<str>>(field: &str, items: &[S]) -> Self {
        Self::new(
            items
                .iter()
                .map(|item| Record::single(field, item.as_ref()))
                .collect(),
        )
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A contiguous slice of the dataset assigned to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    /// Owning participant.
    pub participant: ParticipantId,
    /// Index of the first record within the dataset.
    pub offset: usize,
    /// The shard's records, in dataset order.
    pub records: Vec<Record>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dataset index range covered by this shard.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.records.len()
    }
}

/// Count of one item within a participant's shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub item: String,
    pub count: u64,
}

/// Item frequencies of one shard, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCounts {
    pub entries: Vec<ItemCount>,
}

impl LocalCounts {
    /// Count for an item, `None` when it was not reported.
    pub fn get(&self, item: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.item == item)
            .map(|e| e.count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Keep only entries with `count >= threshold`, preserving order.
    pub fn retain_at_least(mut self, threshold: u64) -> Self {
        self.entries.retain(|e| e.count >= threshold);
        self
    }
}

/// One row of a participant's top-K list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub score: f64,
    pub label: String,
}

/// The statistic a participant reports to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum LocalStatistic {
    Counts(LocalCounts),
    Ranked(Vec<RankedEntry>),
}

impl LocalStatistic {
    /// Number of entries reported.
    pub fn len(&self) -> usize {
        match self {
            LocalStatistic::Counts(c) => c.len(),
            LocalStatistic::Ranked(r) => r.len(),
        }
    }
}

/// Transmission counters for one participant, supplied externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityRecord {
    pub participant: ParticipantId,
    pub received: u64,
    pub sent: u64,
}

impl ReliabilityRecord {
    pub fn new(participant: ParticipantId, received: u64, sent: u64) -> Self {
        Self {
            participant,
            received,
            sent,
        }
    }

    /// Whether `received >= min_ratio * sent`.
    pub fn meets(&self, min_ratio: f64) -> bool {
        self.received as f64 >= min_ratio * self.sent as f64
    }
}

/// One line of the final result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub label: String,
    pub score: f64,
}

impl ResultEntry {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Settings the run was performed with, echoed in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParameters {
    pub mode: AggregationMode,
    pub num_participants: usize,
    pub min_ratio: f64,
    pub local_threshold: u64,
    pub global_threshold: u64,
    pub k: usize,
}

/// Metadata about a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Dataset source.
    pub dataset: String,
    /// Reliability table source.
    pub reliability: String,
    /// Date and time of the run.
    pub run_date: DateTime<Utc>,
    /// Number of dataset records.
    pub records: usize,
    /// Participants admitted by the reliability filter.
    pub admitted: Vec<ParticipantId>,
    /// Admitted participants whose artifact could not be read back.
    pub skipped: Vec<ParticipantId>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// Comparison of the federated result against a centralized computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub centralized: Vec<ResultEntry>,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Share of centralized counts clearing each threshold (heavy hitters only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leakage: Vec<LeakagePoint>,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub parameters: RunParameters,
    pub results: Vec<ResultEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineComparison>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_absent_field() {
        let record = Record::from_pairs([("track_name", "Song"), ("track_popularity", "71")]);
        assert_eq!(record.get("track_name"), Some("Song"));
        assert_eq!(record.get("playlist_genre"), None);
        assert!(!record.has("playlist_genre"));
    }

    #[test]
    fn test_local_counts_retain() {
        let counts = LocalCounts {
            entries: vec![
                ItemCount {
                    item: "a".to_string(),
                    count: 3,
                },
                ItemCount {
                    item: "b".to_string(),
                    count: 1,
                },
                ItemCount {
                    item: "c".to_string(),
                    count: 2,
                },
            ],
        };
        assert_eq!(counts.total(), 6);

        let filtered = counts.retain_at_least(2);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.get("a"), Some(3));
        assert_eq!(filtered.get("b"), None);
        assert_eq!(filtered.entries[1].item, "c");
    }

    #[test]
    fn test_reliability_ratio() {
        let record = ReliabilityRecord::new(1, 50, 100);
        assert!(record.meets(0.5));
        assert!(!record.meets(0.75));
        assert!(ReliabilityRecord::new(2, 0, 0).meets(1.0));
    }

    #[test]
    fn test_mode_metric_name() {
        assert_eq!(AggregationMode::HeavyHitters.metric_name(), "heavy_hitters");
        assert_eq!(AggregationMode::TopK.metric_name(), "ranking");
    }

    #[test]
    fn test_statistic_serde_tagging() {
        let stat = LocalStatistic::Ranked(vec![RankedEntry {
            score: 90.0,
            label: "x".to_string(),
        }]);
        let json = serde_json::to_string(&stat).unwrap();
        assert!(json.contains("\"kind\":\"ranked\""));
        let back: LocalStatistic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stat);
    }
}
