//! Global aggregation of participants' local statistics.
//!
//! Aggregates are built by folding single-participant aggregates through a
//! commutative, associative `merge`. Each accumulator remembers the first
//! place its item appeared in the canonical merge sequence (ascending
//! participant id, then position in that participant's report); merging
//! keeps the minimum, so ties rank the same whatever order the merge ran in.

use crate::error::{FedError, Result};
use crate::models::{ItemCount, LocalCounts, ParticipantId, RankedEntry, ResultEntry};
use std::collections::HashMap;

/// Position of an item in the canonical merge sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirstSeen {
    pub participant: ParticipantId,
    pub position: usize,
}

/// Running sum for one item in count mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountAccumulator {
    pub total: u64,
    pub first_seen: FirstSeen,
}

/// Running (sum, occurrences) for one item in ranking mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedAccumulator {
    pub sum: f64,
    pub occurrences: u64,
    pub first_seen: FirstSeen,
}

impl RankedAccumulator {
    pub fn average(&self) -> f64 {
        self.sum / self.occurrences as f64
    }
}

/// Per-item totals across participants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountAggregate {
    items: HashMap<String, CountAccumulator>,
}

impl CountAggregate {
    /// Aggregate holding a single participant's report.
    pub fn from_local(participant: ParticipantId, counts: &LocalCounts) -> Self {
        let mut aggregate = Self::default();
        for (position, entry) in counts.entries.iter().enumerate() {
            aggregate.absorb(
                entry.item.clone(),
                CountAccumulator {
                    total: entry.count,
                    first_seen: FirstSeen {
                        participant,
                        position,
                    },
                },
            );
        }
        aggregate
    }

    /// Combine two aggregates. Commutative and associative.
    pub fn merge(mut self, other: Self) -> Self {
        for (item, acc) in other.items {
            self.absorb(item, acc);
        }
        self
    }

    fn absorb(&mut self, item: String, acc: CountAccumulator) {
        self.items
            .entry(item)
            .and_modify(|existing| {
                existing.total += acc.total;
                existing.first_seen = existing.first_seen.min(acc.first_seen);
            })
            .or_insert(acc);
    }

    pub fn get(&self, item: &str) -> Option<u64> {
        self.items.get(item).map(|acc| acc.total)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CountAccumulator)> {
        self.items.iter()
    }
}

/// Per-item score sums and report counts across participants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedAggregate {
    items: HashMap<String, RankedAccumulator>,
}

impl RankedAggregate {
    /// Aggregate holding a single participant's top-K list.
    pub fn from_local(participant: ParticipantId, entries: &[RankedEntry]) -> Self {
        let mut aggregate = Self::default();
        for (position, entry) in entries.iter().enumerate() {
            aggregate.absorb(
                entry.label.clone(),
                RankedAccumulator {
                    sum: entry.score,
                    occurrences: 1,
                    first_seen: FirstSeen {
                        participant,
                        position,
                    },
                },
            );
        }
        aggregate
    }

    /// Combine two aggregates. Commutative and associative.
    pub fn merge(mut self, other: Self) -> Self {
        for (label, acc) in other.items {
            self.absorb(label, acc);
        }
        self
    }

    fn absorb(&mut self, label: String, acc: RankedAccumulator) {
        self.items
            .entry(label)
            .and_modify(|existing| {
                existing.sum += acc.sum;
                existing.occurrences += acc.occurrences;
                existing.first_seen = existing.first_seen.min(acc.first_seen);
            })
            .or_insert(acc);
    }

    pub fn get(&self, label: &str) -> Option<&RankedAccumulator> {
        self.items.get(label)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sum admitted participants' frequency (or heavy-hitter) maps.
pub fn aggregate_counts(stats: &[(ParticipantId, LocalCounts)]) -> CountAggregate {
    stats
        .iter()
        .map(|(id, counts)| CountAggregate::from_local(*id, counts))
        .fold(CountAggregate::default(), CountAggregate::merge)
}

/// Items whose aggregated count is at least `global_threshold`,
/// by descending count then first-seen order.
pub fn extract_heavy_hitters(
    aggregate: &CountAggregate,
    global_threshold: u64,
) -> Result<Vec<ItemCount>> {
    if global_threshold == 0 {
        return Err(FedError::invalid(
            "global_threshold",
            "threshold must be at least 1",
        ));
    }

    let mut hitters: Vec<_> = aggregate
        .iter()
        .filter(|(_, acc)| acc.total >= global_threshold)
        .collect();

    hitters.sort_by(|a, b| {
        b.1.total
            .cmp(&a.1.total)
            .then(a.1.first_seen.cmp(&b.1.first_seen))
            .then(a.0.cmp(b.0))
    });

    Ok(hitters
        .into_iter()
        .map(|(item, acc)| ItemCount {
            item: item.clone(),
            count: acc.total,
        })
        .collect())
}

/// Accumulate score sums and occurrences from admitted top-K lists.
pub fn aggregate_ranked(lists: &[(ParticipantId, Vec<RankedEntry>)]) -> RankedAggregate {
    lists
        .iter()
        .map(|(id, entries)| RankedAggregate::from_local(*id, entries))
        .fold(RankedAggregate::default(), RankedAggregate::merge)
}

/// The `k` labels with the highest average score.
pub fn rank(aggregate: &RankedAggregate, k: usize) -> Result<Vec<ResultEntry>> {
    if k == 0 {
        return Err(FedError::invalid("k", "k must be at least 1"));
    }

    let mut ranked: Vec<_> = aggregate
        .items
        .iter()
        .map(|(label, acc)| (label, acc.average(), acc.first_seen))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then(a.2.cmp(&b.2))
            .then(a.0.cmp(b.0))
    });
    ranked.truncate(k);

    Ok(ranked
        .into_iter()
        .map(|(label, average, _)| ResultEntry::new(label.clone(), average))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, Shard};
    use crate::participant::compute_local_heavy_hitters;

    fn counts(pairs: &[(&str, u64)]) -> LocalCounts {
        LocalCounts {
            entries: pairs
                .iter()
                .map(|(item, count)| ItemCount {
                    item: item.to_string(),
                    count: *count,
                })
                .collect(),
        }
    }

    fn ranked(pairs: &[(&str, f64)]) -> Vec<RankedEntry> {
        pairs
            .iter()
            .map(|(label, score)| RankedEntry {
                score: *score,
                label: label.to_string(),
            })
            .collect()
    }

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_aggregate_counts_sums() {
        let stats = vec![
            (1, counts(&[("a", 2), ("b", 1)])),
            (2, counts(&[("b", 4)])),
            (3, counts(&[("c", 7), ("a", 1)])),
        ];
        let aggregate = aggregate_counts(&stats);
        assert_eq!(aggregate.get("a"), Some(3));
        assert_eq!(aggregate.get("b"), Some(5));
        assert_eq!(aggregate.get("c"), Some(7));
        assert_eq!(aggregate.get("d"), None);
    }

    #[test]
    fn test_merge_commutativity() {
        let stats = vec![
            (1, counts(&[("a", 2), ("b", 1)])),
            (2, counts(&[("b", 4), ("c", 2)])),
            (3, counts(&[("c", 7), ("a", 1)])),
            (4, counts(&[("d", 3)])),
        ];
        let expected = aggregate_counts(&stats);

        for order in permutations(&stats) {
            assert_eq!(aggregate_counts(&order), expected);
        }
    }

    #[test]
    fn test_ranked_merge_commutativity() {
        let lists = vec![
            (1, ranked(&[("x", 90.0), ("y", 80.0)])),
            (2, ranked(&[("y", 70.0), ("z", 60.0)])),
            (3, ranked(&[("x", 50.0)])),
        ];
        let expected = aggregate_ranked(&lists);

        for order in permutations(&lists) {
            let aggregate = aggregate_ranked(&order);
            assert_eq!(aggregate, expected);
            assert_eq!(rank(&aggregate, 3).unwrap(), rank(&expected, 3).unwrap());
        }
    }

    #[test]
    fn test_merge_is_associative() {
        let a = CountAggregate::from_local(1, &counts(&[("a", 1), ("b", 2)]));
        let b = CountAggregate::from_local(2, &counts(&[("b", 3)]));
        let c = CountAggregate::from_local(3, &counts(&[("a", 5), ("c", 1)]));

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_local_then_global_heavy_hitters() {
        let streams: [&[&str]; 8] = [
            &["item2", "item1", "item3", "item1", "item2"],
            &["item2", "item2", "item1", "item2"],
            &["item3", "item3", "item1", "item2"],
            &["item4", "item1", "item2"],
            &["item1", "item2", "item3", "item4"],
            &["item5", "item2", "item3", "item4"],
            &["item5", "item5", "item3", "item2", "item1"],
            &["item6", "item1", "item2", "item3"],
        ];

        let stats: Vec<_> = streams
            .iter()
            .enumerate()
            .map(|(i, items)| {
                let shard = Shard {
                    participant: (i + 1) as ParticipantId,
                    offset: 0,
                    records: Dataset::from_items("item", *items).records().to_vec(),
                };
                (
                    shard.participant,
                    compute_local_heavy_hitters(&shard, "item", 2).unwrap(),
                )
            })
            .collect();

        let hitters = extract_heavy_hitters(&aggregate_counts(&stats), 2).unwrap();
        let mut found: Vec<_> = hitters.iter().map(|h| (h.item.as_str(), h.count)).collect();
        found.sort();
        assert_eq!(
            found,
            vec![("item1", 2), ("item2", 5), ("item3", 2), ("item5", 2)]
        );

        // Descending count, ties by first appearance in the merge sequence
        let order: Vec<_> = hitters.iter().map(|h| h.item.as_str()).collect();
        assert_eq!(order, vec!["item2", "item1", "item3", "item5"]);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let stats = vec![
            (1, counts(&[("a", 2), ("b", 9), ("c", 4)])),
            (2, counts(&[("a", 3), ("d", 1)])),
            (3, counts(&[("c", 1), ("e", 6)])),
        ];
        let aggregate = aggregate_counts(&stats);

        for t1 in 1..12 {
            for t2 in (t1 + 1)..12 {
                let low = extract_heavy_hitters(&aggregate, t1).unwrap();
                let high = extract_heavy_hitters(&aggregate, t2).unwrap();
                assert!(high.iter().all(|h| low.contains(h)));
            }
        }
    }

    #[test]
    fn test_global_threshold_applies_to_sum() {
        // Two participants each below the threshold, together above it
        let stats = vec![(1, counts(&[("a", 2)])), (2, counts(&[("a", 2)]))];
        let hitters = extract_heavy_hitters(&aggregate_counts(&stats), 3).unwrap();
        assert_eq!(hitters.len(), 1);
        assert_eq!(hitters[0].count, 4);
    }

    #[test]
    fn test_rank_by_average() {
        let lists = vec![
            (1, ranked(&[("x", 90.0), ("y", 80.0)])),
            (2, ranked(&[("y", 100.0), ("z", 70.0)])),
            (3, ranked(&[("x", 70.0)])),
        ];
        let aggregate = aggregate_ranked(&lists);

        let acc = aggregate.get("y").unwrap();
        assert_eq!(acc.occurrences, 2);
        assert_eq!(acc.sum, 180.0);

        let top = rank(&aggregate, 2).unwrap();
        assert_eq!(top, vec![ResultEntry::new("y", 90.0), ResultEntry::new("x", 80.0)]);
    }

    #[test]
    fn test_rank_tie_break_first_seen() {
        let lists = vec![
            (2, ranked(&[("late", 50.0)])),
            (1, ranked(&[("early", 50.0), ("second", 50.0)])),
        ];
        let top = rank(&aggregate_ranked(&lists), 3).unwrap();
        let labels: Vec<_> = top.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["early", "second", "late"]);
    }

    #[test]
    fn test_rank_with_non_finite_averages() {
        // inf + -inf sums to NaN; ranking must still be a total order
        let lists = vec![
            (1, ranked(&[("n", f64::INFINITY), ("a", 10.0), ("b", 20.0)])),
            (2, ranked(&[("n", f64::NEG_INFINITY), ("c", 30.0), ("d", 5.0)])),
        ];
        let aggregate = aggregate_ranked(&lists);
        assert!(aggregate.get("n").unwrap().average().is_nan());

        let top = rank(&aggregate, 5).unwrap();
        assert_eq!(top.len(), 5);
        let finite: Vec<_> = top
            .iter()
            .filter(|e| e.score.is_finite())
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(finite, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn test_zero_parameters_rejected() {
        assert!(extract_heavy_hitters(&CountAggregate::default(), 0).is_err());
        assert!(rank(&RankedAggregate::default(), 0).is_err());
    }

    #[test]
    fn test_empty_aggregate() {
        assert!(aggregate_counts(&[]).is_empty());
        assert!(rank(&aggregate_ranked(&[]), 3).unwrap().is_empty());
    }
}
