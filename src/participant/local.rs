//! Local statistics computed by a participant over its own shard.
//!
//! Everything here is a pure function of the shard, so shards can be
//! processed independently and in any order.

use crate::error::{FedError, Result};
use crate::models::{ItemCount, LocalCounts, RankedEntry, Record, Shard};
use std::collections::HashMap;

/// Separator between label field values.
pub const LABEL_SEPARATOR: &str = " - ";

/// Exact count of every distinct value of `item_field` in the shard.
pub fn compute_local_frequency(shard: &Shard, item_field: &str) -> Result<LocalCounts> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<ItemCount> = Vec::new();

    for (i, record) in shard.records.iter().enumerate() {
        let item = require(shard, record, i, item_field)?;

        match positions.get(item) {
            Some(&pos) => entries[pos].count += 1,
            None => {
                positions.insert(item, entries.len());
                entries.push(ItemCount {
                    item: item.to_string(),
                    count: 1,
                });
            }
        }
    }

    Ok(LocalCounts { entries })
}

/// Local frequencies restricted to items with `count >= threshold`.
pub fn compute_local_heavy_hitters(
    shard: &Shard,
    item_field: &str,
    threshold: u64,
) -> Result<LocalCounts> {
    if threshold == 0 {
        return Err(FedError::invalid(
            "local_threshold",
            "threshold must be at least 1",
        ));
    }

    Ok(compute_local_frequency(shard, item_field)?.retain_at_least(threshold))
}

/// Up to `k` rows with the highest numeric `score_field`.
///
/// Rows whose score is missing or not a finite number are left out of the
/// ranking. Equal scores keep shard order. Labels join `label_fields` with
/// `" - "`, followed by the `qualifier` field's value in parentheses when
/// one is given, e.g. `"Song - Artist (pop)"`.
pub fn compute_local_top_k(
    shard: &Shard,
    k: usize,
    score_field: &str,
    label_fields: &[String],
    qualifier: Option<&str>,
) -> Result<Vec<RankedEntry>> {
    if k == 0 {
        return Err(FedError::invalid("k", "k must be at least 1"));
    }
    if label_fields.is_empty() {
        return Err(FedError::invalid(
            "label_fields",
            "at least one label field is required",
        ));
    }

    if !shard.is_empty() && !shard.records.iter().any(|r| r.has(score_field)) {
        return Err(FedError::MissingField {
            participant: shard.participant,
            field: score_field.to_string(),
            row: shard.offset,
        });
    }

    let mut candidates: Vec<(f64, usize, String)> = Vec::new();
    for (i, record) in shard.records.iter().enumerate() {
        let label = build_label(shard, record, i, label_fields, qualifier)?;
        if let Some(score) = record.get(score_field).and_then(parse_score) {
            candidates.push((score, i, label));
        }
    }

    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    candidates.truncate(k);

    Ok(candidates
        .into_iter()
        .map(|(score, _, label)| RankedEntry { score, label })
        .collect())
}

/// Parse a score, treating blanks and non-finite values as absent.
pub fn parse_score(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|s| s.is_finite())
}

fn build_label(
    shard: &Shard,
    record: &Record,
    index: usize,
    label_fields: &[String],
    qualifier: Option<&str>,
) -> Result<String> {
    let parts = label_fields
        .iter()
        .map(|field| require(shard, record, index, field))
        .collect::<Result<Vec<_>>>()?;
    let label = parts.join(LABEL_SEPARATOR);

    match qualifier {
        Some(field) => Ok(format!(
            "{} ({})",
            label,
            require(shard, record, index, field)?
        )),
        None => Ok(label),
    }
}

fn require<'r>(shard: &Shard, record: &'r Record, index: usize, field: &str) -> Result<&'r str> {
    record.get(field).ok_or_else(|| FedError::MissingField {
        participant: shard.participant,
        field: field.to_string(),
        row: shard.offset + index,
    })
}
