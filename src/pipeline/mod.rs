//! The single-pass federated aggregation run.
//!
//! A run moves through `Idle → PartitionAssigned → LocalStatsCollected →
//! ReliabilityFiltered → Aggregated → Finalized`. Any error other than a
//! missing artifact ends it in `Failed`; a failed run is never resumed.

pub mod baseline;

pub use baseline::compare_with_centralized;

use crate::analysis::{aggregate_counts, aggregate_ranked, extract_heavy_hitters, rank};
use crate::error::{FedError, Result};
use crate::models::{
    AggregationMode, Dataset, LocalStatistic, ParticipantId, ReliabilityRecord, ResultEntry, Shard,
};
use crate::participant::{AgentConfig, ParticipantAgent};
use crate::partition::partition;
use crate::reliability::{participant_ids, select_reliable};
use crate::storage::ArtifactStore;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    PartitionAssigned,
    LocalStatsCollected,
    ReliabilityFiltered,
    Aggregated,
    Finalized,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::PartitionAssigned => "partition assigned",
            RunState::LocalStatsCollected => "local statistics collected",
            RunState::ReliabilityFiltered => "reliability filtered",
            RunState::Aggregated => "aggregated",
            RunState::Finalized => "finalized",
            RunState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// What each participant computes.
    pub agent: AgentConfig,
    pub num_participants: usize,
    pub min_ratio: f64,
    pub global_threshold: u64,
    /// Maximum shards processed at once.
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            num_participants: 8,
            min_ratio: 0.25,
            global_threshold: 2,
            concurrency: 4,
            show_progress: false,
        }
    }
}

/// What a finalized run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Final ranked result.
    pub results: Vec<ResultEntry>,
    /// Total participants the dataset was split across.
    pub total_participants: usize,
    /// Participants admitted by the reliability filter.
    pub admitted: Vec<ParticipantId>,
    /// Admitted participants whose artifact was missing.
    pub skipped: Vec<ParticipantId>,
}

impl RunOutcome {
    /// Participants whose statistic made it into the merge.
    pub fn contributors(&self) -> usize {
        self.admitted.len() - self.skipped.len()
    }
}

/// Drives one run against an artifact store.
pub struct FederatedRun {
    config: PipelineConfig,
    store: Arc<dyn ArtifactStore>,
    state: RunState,
}

impl FederatedRun {
    pub fn new(config: PipelineConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            store,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the whole pipeline once.
    pub async fn execute(
        &mut self,
        dataset: &Dataset,
        reliability: &[ReliabilityRecord],
    ) -> Result<RunOutcome> {
        if self.state != RunState::Idle {
            return Err(FedError::invalid(
                "run",
                format!("a run can only execute once (currently {})", self.state),
            ));
        }

        match self.run_stages(dataset, reliability).await {
            Ok(outcome) => {
                self.transition(RunState::Finalized);
                Ok(outcome)
            }
            Err(e) => {
                self.transition(RunState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }

    async fn run_stages(
        &mut self,
        dataset: &Dataset,
        reliability: &[ReliabilityRecord],
    ) -> Result<RunOutcome> {
        validate(&self.config)?;

        let shards = partition(dataset, self.config.num_participants)?;
        self.transition(RunState::PartitionAssigned);

        let written = self.collect_local_statistics(shards).await?;
        self.transition(RunState::LocalStatsCollected);

        let ids = participant_ids(self.config.num_participants);
        let admitted = select_reliable(&ids, reliability, self.config.min_ratio)?;
        self.transition(RunState::ReliabilityFiltered);

        let mut contributions = Vec::with_capacity(admitted.len());
        let mut skipped = Vec::new();
        for &id in &admitted {
            match self.fetch(id, &written) {
                Ok(statistic) => contributions.push((id, statistic)),
                Err(e) if e.is_recoverable() => {
                    warn!("{}; skipping participant", e);
                    skipped.push(id);
                }
                Err(e) => return Err(e),
            }
        }

        let results = self.merge(contributions)?;
        self.transition(RunState::Aggregated);

        info!(
            "Aggregated {} of {} admitted participants into {} results",
            admitted.len() - skipped.len(),
            admitted.len(),
            results.len()
        );

        Ok(RunOutcome {
            results,
            total_participants: self.config.num_participants,
            admitted: admitted.into_iter().collect(),
            skipped,
        })
    }

    /// Read back an artifact written by this run.
    ///
    /// The store may hold artifacts left by earlier runs; those are never
    /// read, so an id without a shard in this run is always missing.
    fn fetch(
        &self,
        participant: ParticipantId,
        written: &BTreeSet<ParticipantId>,
    ) -> Result<LocalStatistic> {
        if !written.contains(&participant) {
            return Err(FedError::MissingShard { participant });
        }
        self.store
            .get(participant)?
            .ok_or(FedError::MissingShard { participant })
    }

    /// Compute every shard's statistic concurrently and persist it.
    ///
    /// Returns the ids written.
    async fn collect_local_statistics(
        &self,
        shards: Vec<Shard>,
    ) -> Result<BTreeSet<ParticipantId>> {
        let agent = ParticipantAgent::new(self.config.agent.clone());
        let progress = progress_bar(shards.len(), self.config.show_progress);

        let tasks = shards.into_iter().map(|shard| {
            let agent = agent.clone();
            tokio::task::spawn_blocking(move || (shard.participant, agent.compute(&shard)))
        });

        let mut computed: Vec<(ParticipantId, Result<LocalStatistic>)> = Vec::new();
        let mut completed = stream::iter(tasks).buffer_unordered(self.config.concurrency.max(1));
        while let Some(joined) = completed.next().await {
            computed.push(joined?);
            progress.inc(1);
        }
        progress.finish_and_clear();

        // Deterministic error reporting and write order
        computed.sort_by_key(|(id, _)| *id);

        let mut written = BTreeSet::new();
        for (id, statistic) in computed {
            self.store.put(id, &statistic?)?;
            written.insert(id);
        }

        Ok(written)
    }

    fn merge(&self, contributions: Vec<(ParticipantId, LocalStatistic)>) -> Result<Vec<ResultEntry>> {
        match self.config.agent.mode {
            AggregationMode::HeavyHitters => {
                let counts = contributions
                    .into_iter()
                    .map(|(id, statistic)| match statistic {
                        LocalStatistic::Counts(c) => Ok((id, c)),
                        LocalStatistic::Ranked(_) => Err(mismatch(id, "a ranked list")),
                    })
                    .collect::<Result<Vec<_>>>()?;

                let aggregate = aggregate_counts(&counts);
                debug!("Global aggregate holds {} items", aggregate.len());

                Ok(extract_heavy_hitters(&aggregate, self.config.global_threshold)?
                    .into_iter()
                    .map(|h| ResultEntry::new(h.item, h.count as f64))
                    .collect())
            }
            AggregationMode::TopK => {
                let lists = contributions
                    .into_iter()
                    .map(|(id, statistic)| match statistic {
                        LocalStatistic::Ranked(r) => Ok((id, r)),
                        LocalStatistic::Counts(_) => Err(mismatch(id, "item counts")),
                    })
                    .collect::<Result<Vec<_>>>()?;

                let aggregate = aggregate_ranked(&lists);
                debug!("Global aggregate holds {} labels", aggregate.len());

                rank(&aggregate, self.config.agent.k)
            }
        }
    }
}

fn mismatch(participant: ParticipantId, found: &str) -> FedError {
    FedError::Serialization(format!(
        "artifact for participant {} holds {}, which does not match the run mode",
        participant, found
    ))
}

/// Reject bad settings before any work starts.
fn validate(config: &PipelineConfig) -> Result<()> {
    if config.num_participants == 0 {
        return Err(FedError::invalid(
            "num_participants",
            "number of participants must be greater than 0",
        ));
    }
    if !config.min_ratio.is_finite() || config.min_ratio < 0.0 {
        return Err(FedError::invalid(
            "min_ratio",
            format!("ratio must be a non-negative number, got {}", config.min_ratio),
        ));
    }

    match config.agent.mode {
        AggregationMode::HeavyHitters => {
            if config.agent.local_threshold == 0 {
                return Err(FedError::invalid("local_threshold", "must be at least 1"));
            }
            if config.global_threshold == 0 {
                return Err(FedError::invalid("global_threshold", "must be at least 1"));
            }
        }
        AggregationMode::TopK => {
            if config.agent.k == 0 {
                return Err(FedError::invalid("k", "must be at least 1"));
            }
            if config.agent.label_fields.is_empty() {
                return Err(FedError::invalid("label_fields", "at least one is required"));
            }
        }
    }

    Ok(())
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} shards")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
