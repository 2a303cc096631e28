//! Per-participant artifact storage.
//!
//! Participants persist their local statistic under their id; the
//! coordinator reads back only the admitted ones. The merge logic only sees
//! the `ArtifactStore` trait, so the medium can be swapped freely.

mod file_store;

pub use file_store::FileStore;

use crate::error::Result;
use crate::models::{LocalStatistic, ParticipantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage for participants' local statistics, keyed by participant id.
pub trait ArtifactStore: Send + Sync {
    /// Persist a participant's statistic, replacing any previous one.
    fn put(&self, participant: ParticipantId, statistic: &LocalStatistic) -> Result<()>;

    /// Read a participant's statistic back, `None` when nothing was stored.
    fn get(&self, participant: ParticipantId) -> Result<Option<LocalStatistic>>;

    /// Short description for logs and the console summary.
    fn describe(&self) -> String;
}

/// Which store backs a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Keep artifacts in memory for the duration of the run
    #[default]
    Memory,
    /// Write one JSON file per participant
    File,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Mutex<HashMap<ParticipantId, LocalStatistic>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ParticipantId, LocalStatistic>> {
        // A panicked writer cannot leave a half-written entry behind
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, participant: ParticipantId, statistic: &LocalStatistic) -> Result<()> {
        self.lock().insert(participant, statistic.clone());
        Ok(())
    }

    fn get(&self, participant: ParticipantId) -> Result<Option<LocalStatistic>> {
        Ok(self.lock().get(&participant).cloned())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
