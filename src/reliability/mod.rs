//! Reliability-based participant selection.
//!
//! A participant is admitted when it delivered at least `min_ratio` of the
//! packets it sent. Admitted ids come from the reliability table itself, so
//! a table naming unknown participants can over-select; that is rejected
//! before any aggregation work starts.

use crate::error::{FedError, Result};
use crate::models::{ParticipantId, ReliabilityRecord};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Select the participants whose transmissions meet `min_ratio`.
pub fn select_reliable(
    participant_ids: &[ParticipantId],
    records: &[ReliabilityRecord],
    min_ratio: f64,
) -> Result<BTreeSet<ParticipantId>> {
    if !min_ratio.is_finite() || min_ratio < 0.0 {
        return Err(FedError::invalid(
            "min_ratio",
            format!("ratio must be a non-negative number, got {}", min_ratio),
        ));
    }

    let admitted: BTreeSet<ParticipantId> = records
        .iter()
        .filter(|r| r.meets(min_ratio))
        .map(|r| r.participant)
        .collect();

    let total = participant_ids.len();

    if admitted.len() > total {
        return Err(FedError::ClientCount {
            selected: admitted.len(),
            total,
        });
    }

    if admitted.is_empty() {
        return Err(FedError::EmptySelection { min_ratio, total });
    }

    let unknown: Vec<_> = admitted
        .iter()
        .filter(|id| !participant_ids.contains(*id))
        .collect();
    if !unknown.is_empty() {
        debug!("Reliability table admits unknown participants: {:?}", unknown);
    }

    info!(
        "Admitted {} of {} participants at ratio {}",
        admitted.len(),
        total,
        min_ratio
    );

    Ok(admitted)
}

/// Number of distinct participants named in the reliability table.
pub fn participant_count(records: &[ReliabilityRecord]) -> usize {
    records
        .iter()
        .map(|r| r.participant)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Ids `1..=n`.
pub fn participant_ids(n: usize) -> Vec<ParticipantId> {
    (1..=n as ParticipantId).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<ReliabilityRecord> {
        vec![
            ReliabilityRecord::new(1, 100, 100),
            ReliabilityRecord::new(2, 40, 100),
            ReliabilityRecord::new(3, 75, 100),
            ReliabilityRecord::new(4, 0, 100),
        ]
    }

    #[test]
    fn test_select_by_ratio() {
        let ids = participant_ids(4);

        let admitted = select_reliable(&ids, &table(), 0.5).unwrap();
        assert_eq!(admitted.into_iter().collect::<Vec<_>>(), vec![1, 3]);

        let admitted = select_reliable(&ids, &table(), 0.0).unwrap();
        assert_eq!(admitted.len(), 4);

        let admitted = select_reliable(&ids, &table(), 1.0).unwrap();
        assert_eq!(admitted.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_over_selection_fails() {
        let ids = participant_ids(3);
        let mut records = table();
        records.push(ReliabilityRecord::new(9, 10, 10));

        match select_reliable(&ids, &records, 0.0) {
            Err(FedError::ClientCount { selected, total }) => {
                assert_eq!(selected, 5);
                assert_eq!(total, 3);
            }
            other => panic!("expected ClientCount, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_id_within_bound_is_admitted() {
        let ids = participant_ids(4);
        let records = vec![ReliabilityRecord::new(7, 10, 10)];
        let admitted = select_reliable(&ids, &records, 0.5).unwrap();
        assert!(admitted.contains(&7));
    }

    #[test]
    fn test_total_unreachability() {
        let ids = participant_ids(4);
        assert!(matches!(
            select_reliable(&ids, &table(), 1.5),
            Err(FedError::EmptySelection { total: 4, .. })
        ));
    }

    #[test]
    fn test_duplicate_rows_count_once() {
        let ids = participant_ids(2);
        let records = vec![
            ReliabilityRecord::new(1, 10, 10),
            ReliabilityRecord::new(1, 9, 10),
            ReliabilityRecord::new(2, 10, 10),
        ];
        assert_eq!(select_reliable(&ids, &records, 0.5).unwrap().len(), 2);
        assert_eq!(participant_count(&records), 2);
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let ids = participant_ids(4);
        assert!(matches!(
            select_reliable(&ids, &table(), -0.1),
            Err(FedError::InvalidParameter { .. })
        ));
        assert!(matches!(
            select_reliable(&ids, &table(), f64::NAN),
            Err(FedError::InvalidParameter { .. })
        ));
    }
}
