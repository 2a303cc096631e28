//! Dataset partitioning.
//!
//! Splits a dataset into one contiguous shard per participant. Every shard
//! gets `len / n` records; the remainder goes to the last shard.

use crate::error::{FedError, Result};
use crate::models::{Dataset, ParticipantId, Shard};
use tracing::debug;

/// Partition `dataset` across `num_participants` participants.
pub fn partition(dataset: &Dataset, num_participants: usize) -> Result<Vec<Shard>> {
    if num_participants == 0 {
        return Err(FedError::invalid(
            "num_participants",
            "number of participants must be greater than 0",
        ));
    }
    if dataset.is_empty() {
        return Err(FedError::invalid("dataset", "dataset is empty"));
    }

    let records = dataset.records();
    let base = records.len() / num_participants;
    let mut shards = Vec::with_capacity(num_participants);

    let mut start = 0;
    for index in 0..num_participants {
        let end = if index + 1 == num_participants {
            records.len()
        } else {
            start + base
        };

        shards.push(Shard {
            participant: (index + 1) as ParticipantId,
            offset: start,
            records: records[start..end].to_vec(),
        });
        start = end;
    }

    debug!(
        "Partitioned {} records into {} shards ({} per shard, {} extra on the last)",
        records.len(),
        num_participants,
        base,
        records.len() % num_participants
    );

    Ok(shards)
}
