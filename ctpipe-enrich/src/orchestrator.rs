//! Enrichment orchestrator
//!
//! Two sweeps over the record store:
//!
//! - the **forward sweep** processes each stage's pending set in
//!   dependency order (`targets`, then `ppi`, then `failure_details`),
//!   sequentially per record — never two stages of the same record at
//!   once, which keeps the status-map read-modify-write safe;
//! - the **retry sweep** replays due retry-queue entries, rescheduling on
//!   repeated failure and permanently failing a stage at the ceiling.
//!
//! A stage error never propagates past the record that raised it: it is
//! logged, queued, and the batch continues.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::analysis::{AnalysisError, FailureAnalyzer};
use crate::connectors::{ConnectorError, ConnectorSet};
use crate::db::trials;
use crate::models::{Stage, StageStatus, TrialRecord};
use crate::queue::{RetryQueue, RETRY_CEILING};
use crate::stages;

/// One stage attempt error
#[derive(Debug, Error)]
enum AttemptError {
    /// Record store failure — aborts the sweep
    #[error(transparent)]
    Store(#[from] ctpipe_common::Error),

    /// Connector failure — queued or rescheduled for retry
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

impl From<AnalysisError> for AttemptError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Store(e) => AttemptError::Store(e),
            AnalysisError::Connector(e) => AttemptError::Connector(e),
        }
    }
}

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub processed: u64,
    pub succeeded: u64,
    /// Newly queued for retry (forward sweep)
    pub queued: u64,
    /// Rescheduled after another failed attempt (retry sweep)
    pub rescheduled: u64,
    /// Permanently failed at the retry ceiling
    pub permanently_failed: u64,
}

/// Single-process orchestrator over the shared durable store
pub struct EnrichmentOrchestrator {
    db: SqlitePool,
    connectors: ConnectorSet,
    queue: RetryQueue,
    /// Present only when the classification engine is configured; retry
    /// entries for `llm_analysis` stay scheduled while it is absent
    analyzer: Option<FailureAnalyzer>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        db: SqlitePool,
        connectors: ConnectorSet,
        analyzer: Option<FailureAnalyzer>,
    ) -> Self {
        let queue = RetryQueue::new(db.clone());
        Self {
            db,
            connectors,
            queue,
            analyzer,
        }
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    /// Forward-progress sweep: process every pending enrichment stage.
    ///
    /// A failed record's stage status stays `pending` — it is only the
    /// retry queue that eventually flips it to `failed`.
    pub async fn run_enrich_sweep(&mut self) -> ctpipe_common::Result<SweepStats> {
        let mut stats = SweepStats::default();

        for stage in [Stage::Targets, Stage::Ppi, Stage::FailureDetails] {
            let pending = trials::load_stage_pending(&self.db, stage).await?;
            tracing::info!(stage = %stage, pending = pending.len(), "Forward sweep");

            for trial in pending {
                // A record already awaiting retry keeps its schedule
                if self.queue.entry_for(&trial.nct_id, stage).await?.is_some() {
                    continue;
                }

                stats.processed += 1;
                match self.attempt_stage(&trial, stage).await {
                    Ok(()) => stats.succeeded += 1,
                    Err(AttemptError::Connector(e)) => {
                        self.queue
                            .enqueue(&trial.nct_id, stage, &e.to_string(), Utc::now())
                            .await?;
                        stats.queued += 1;
                    }
                    Err(AttemptError::Store(e)) => return Err(e),
                }
            }
        }

        tracing::info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            queued = stats.queued,
            "Forward sweep finished"
        );

        Ok(stats)
    }

    /// Retry sweep: replay every due queue entry.
    ///
    /// Idempotent — entries are selected by `next_retry_at <= now`, so
    /// re-running before the next schedule is a no-op.
    pub async fn run_retry_sweep(&mut self, now: DateTime<Utc>) -> ctpipe_common::Result<SweepStats> {
        let mut stats = SweepStats::default();
        let due = self.queue.due_entries(now).await?;

        tracing::info!(due = due.len(), "Retry sweep");

        for entry in due {
            let Some(trial) = trials::get_trial(&self.db, &entry.nct_id).await? else {
                tracing::warn!(nct_id = %entry.nct_id, "Queued record no longer exists, dropping entry");
                self.queue.remove(entry.id).await?;
                continue;
            };

            // Already completed out-of-band: nothing left to retry
            if trial.enrichment_status.stage(entry.stage) == StageStatus::Completed {
                self.queue.remove(entry.id).await?;
                continue;
            }

            if entry.stage == Stage::LlmAnalysis && self.analyzer.is_none() {
                tracing::warn!(
                    nct_id = %entry.nct_id,
                    "Classification engine not configured, leaving retry scheduled"
                );
                continue;
            }

            stats.processed += 1;
            tracing::info!(
                nct_id = %entry.nct_id,
                stage = %entry.stage,
                attempt = entry.retry_count + 1,
                "Retrying stage"
            );

            match self.attempt_stage(&trial, entry.stage).await {
                Ok(()) => {
                    self.queue.remove(entry.id).await?;
                    stats.succeeded += 1;
                }
                Err(AttemptError::Connector(e)) => {
                    let attempts = entry.retry_count + 1;
                    if attempts >= RETRY_CEILING {
                        tracing::error!(
                            nct_id = %entry.nct_id,
                            stage = %entry.stage,
                            attempts,
                            "Retry ceiling reached, stage permanently failed"
                        );
                        trials::mark_stage_failed(&self.db, &entry.nct_id, entry.stage).await?;
                        self.queue.remove(entry.id).await?;
                        stats.permanently_failed += 1;
                    } else {
                        self.queue
                            .reschedule(entry.id, attempts, &e.to_string(), now)
                            .await?;
                        stats.rescheduled += 1;
                    }
                }
                Err(AttemptError::Store(e)) => return Err(e),
            }
        }

        Ok(stats)
    }

    /// Run one stage executor for one record and persist the completion
    async fn attempt_stage(
        &mut self,
        trial: &TrialRecord,
        stage: Stage,
    ) -> Result<(), AttemptError> {
        match stage {
            Stage::Targets => {
                let payload = stages::enrich_targets(trial, &self.connectors).await?;
                self.complete(trial, stage, &payload).await
            }
            Stage::Ppi => {
                let payload = stages::enrich_ppi(trial, &self.connectors).await?;
                self.complete(trial, stage, &payload).await
            }
            Stage::FailureDetails => {
                let payload = stages::enrich_failure_details(trial, &self.connectors).await?;
                self.complete(trial, stage, &payload).await
            }
            Stage::LlmAnalysis => {
                // Guarded by the retry sweep; kept as a hard error in case
                // a new call path forgets the guard
                let Some(analyzer) = self.analyzer.as_mut() else {
                    return Err(AttemptError::Store(ctpipe_common::Error::Internal(
                        "classification engine not configured".to_string(),
                    )));
                };
                analyzer.attempt(trial).await?;
                Ok(())
            }
        }
    }

    async fn complete<T: serde::Serialize>(
        &self,
        trial: &TrialRecord,
        stage: Stage,
        payload: &T,
    ) -> Result<(), AttemptError> {
        let json = serde_json::to_string(payload).map_err(|e| {
            AttemptError::Store(ctpipe_common::Error::Internal(format!(
                "Failed to serialize {} payload: {}",
                stage, e
            )))
        })?;
        trials::complete_stage(&self.db, &trial.nct_id, stage, json).await?;
        Ok(())
    }
}
