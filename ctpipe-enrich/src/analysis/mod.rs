//! Classification engine
//!
//! Per-record state machine:
//! `not_started → heuristic_checked → {override_applied | pass1_classified → pass2_verified}`.
//!
//! A cached result short-circuits everything. The two-pass protocol is
//! all-or-nothing: if pass 2 fails, pass 1's output is discarded entirely
//! and no cache entry is written, so cached entries are always complete,
//! verified results.

pub mod heuristics;
pub mod llm;
pub mod prompts;

pub use heuristics::{check_safety_heuristics, HeuristicOverride};
pub use llm::{AnthropicClient, LlmClient, LlmResponse};
pub use prompts::{
    build_classification_prompt, build_verification_prompt, parse_classification,
    parse_verification, InitialClassification, Verification,
};

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

use crate::connectors::ConnectorError;
use crate::db::{llm_cache, trials};
use crate::models::{Confidence, FailureCategory, LlmAnalysis, Stage, TrialRecord};
use crate::queue::RetryQueue;

/// Blended per-token price across input/output, USD per 1k tokens
const COST_PER_1K_TOKENS: f64 = 0.009;

/// Approximate dollar cost for a token count
pub fn calculate_cost(tokens: u64) -> f64 {
    tokens as f64 / 1000.0 * COST_PER_1K_TOKENS
}

/// Classification attempt error
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Record store / cache failure — aborts the run
    #[error(transparent)]
    Store(#[from] ctpipe_common::Error),

    /// Model connector failure — routed into the retry queue
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// How one record's classification was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Cached result reused verbatim
    CacheHit,
    /// Deterministic safety override, no model call
    HeuristicOverride,
    /// Two-pass model classification
    Classified,
}

/// Token/cost accounting across a run
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisStats {
    pub analyzed: u64,
    pub cache_hits: u64,
    pub overrides: u64,
    pub queued: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

/// Two-pass LLM failure classifier with heuristic overrides and caching
pub struct FailureAnalyzer {
    db: SqlitePool,
    llm: Arc<dyn LlmClient>,
    queue: RetryQueue,
    stats: AnalysisStats,
}

impl FailureAnalyzer {
    pub fn new(db: SqlitePool, llm: Arc<dyn LlmClient>) -> Self {
        let queue = RetryQueue::new(db.clone());
        Self {
            db,
            llm,
            queue,
            stats: AnalysisStats::default(),
        }
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats
    }

    /// Classify every record whose failure-detail enrichment is completed
    /// and whose `llm_analysis` stage is pending. Model failures are queued
    /// for retry; the batch always runs to the end.
    pub async fn analyze_pending(
        &mut self,
        limit: Option<usize>,
    ) -> ctpipe_common::Result<AnalysisStats> {
        let mut pending = trials::load_stage_pending(&self.db, Stage::LlmAnalysis).await?;
        if let Some(limit) = limit {
            pending.truncate(limit);
        }

        tracing::info!(pending = pending.len(), "Starting failure classification");

        for trial in &pending {
            // A record already awaiting retry keeps its backoff schedule
            if self
                .queue
                .entry_for(&trial.nct_id, Stage::LlmAnalysis)
                .await?
                .is_some()
            {
                continue;
            }

            match self.attempt(trial).await {
                Ok(outcome) => {
                    tracing::info!(nct_id = %trial.nct_id, outcome = ?outcome, "Classified");
                }
                Err(AnalysisError::Connector(e)) => {
                    self.queue
                        .enqueue(&trial.nct_id, Stage::LlmAnalysis, &e.to_string(), Utc::now())
                        .await?;
                    self.stats.queued += 1;
                }
                Err(AnalysisError::Store(e)) => return Err(e),
            }
        }

        tracing::info!(
            analyzed = self.stats.analyzed,
            cache_hits = self.stats.cache_hits,
            overrides = self.stats.overrides,
            queued = self.stats.queued,
            total_tokens = self.stats.total_tokens,
            total_cost_usd = self.stats.total_cost_usd,
            "Failure classification finished"
        );

        Ok(self.stats)
    }

    /// One classification attempt for one record.
    ///
    /// On success the result is cached (when new) and written to the
    /// record with the stage marked completed. Connector errors leave the
    /// record and cache untouched for the caller to route into the retry
    /// queue.
    pub async fn attempt(&mut self, trial: &TrialRecord) -> Result<AnalysisOutcome, AnalysisError> {
        // Cache check is unconditional and bypasses everything else
        if let Some(cached) = llm_cache::get(&self.db, &trial.nct_id).await? {
            self.complete_stage(&trial.nct_id, &cached).await?;
            self.stats.cache_hits += 1;
            return Ok(AnalysisOutcome::CacheHit);
        }

        // Deterministic safety override: no model call when it fires
        if let Some(fired) = check_safety_heuristics(trial) {
            tracing::info!(nct_id = %trial.nct_id, reason = %fired.reason, "Heuristic override");

            let analysis = LlmAnalysis {
                classification: FailureCategory::Safety,
                confidence: Confidence::High,
                reasoning: fired.reason,
                heuristic_override: true,
                verification_passed: true,
                contradictions_found: Vec::new(),
                sae_summary: Some(fired.sae_summary),
                analysis_timestamp: Utc::now(),
                model: None,
                tokens_used: 0,
                cost_usd: 0.0,
            };

            llm_cache::put(&self.db, &trial.nct_id, &analysis).await?;
            self.complete_stage(&trial.nct_id, &analysis).await?;
            self.stats.overrides += 1;
            return Ok(AnalysisOutcome::HeuristicOverride);
        }

        // Two model passes; an error in either discards the whole attempt
        let analysis = self.run_two_pass(trial).await?;

        self.stats.total_tokens += analysis.tokens_used;
        self.stats.total_cost_usd += analysis.cost_usd;

        llm_cache::put(&self.db, &trial.nct_id, &analysis).await?;
        self.complete_stage(&trial.nct_id, &analysis).await?;
        self.stats.analyzed += 1;

        Ok(AnalysisOutcome::Classified)
    }

    /// Pass 1 (classification) then pass 2 (self-verification)
    async fn run_two_pass(&self, trial: &TrialRecord) -> Result<LlmAnalysis, ConnectorError> {
        let classification_prompt = build_classification_prompt(trial);
        let pass1_response = self.llm.complete(&classification_prompt).await?;
        let initial = parse_classification(&pass1_response.text);

        tracing::debug!(
            nct_id = %trial.nct_id,
            category = %initial.category,
            confidence = %initial.confidence,
            "Pass 1 classification"
        );

        let verification_prompt = build_verification_prompt(trial, &initial);
        let pass2_response = self.llm.complete(&verification_prompt).await?;
        let verification = parse_verification(&pass2_response.text);

        tracing::debug!(
            nct_id = %trial.nct_id,
            passed = verification.passed,
            "Pass 2 verification"
        );

        let tokens_used = pass1_response.total_tokens() + pass2_response.total_tokens();

        Ok(LlmAnalysis {
            classification: verification.revised_category.unwrap_or(initial.category),
            confidence: verification.confidence,
            reasoning: initial.reasoning,
            heuristic_override: false,
            verification_passed: verification.passed,
            contradictions_found: verification.contradictions,
            sae_summary: None,
            analysis_timestamp: Utc::now(),
            model: Some(pass1_response.model),
            tokens_used,
            cost_usd: calculate_cost(tokens_used),
        })
    }

    async fn complete_stage(
        &self,
        nct_id: &str,
        analysis: &LlmAnalysis,
    ) -> ctpipe_common::Result<()> {
        let payload = serde_json::to_string(analysis).map_err(|e| {
            ctpipe_common::Error::Internal(format!("Failed to serialize analysis: {}", e))
        })?;
        trials::complete_stage(&self.db, nct_id, Stage::LlmAnalysis, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_model() {
        assert!((calculate_cost(1000) - 0.009).abs() < 1e-12);
        assert_eq!(calculate_cost(0), 0.0);
    }
}
