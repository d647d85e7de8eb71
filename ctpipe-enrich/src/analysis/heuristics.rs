//! Deterministic safety-heuristic overrides
//!
//! Checked before any model call. When unambiguous adverse-event evidence
//! exists the classification is forced to `FAILURE_SAFETY`/`high` and the
//! model is never invoked.

use crate::models::{SaeSummary, TrialRecord};

/// A fired override with its auditable reason
#[derive(Debug, Clone)]
pub struct HeuristicOverride {
    pub reason: String,
    pub sae_summary: SaeSummary,
}

/// Check the deterministic safety signals, in precedence order:
/// 1. any trial-related deaths
/// 2. serious-adverse-event rate above 10%
/// 3. the computed safety-signal flag
pub fn check_safety_heuristics(trial: &TrialRecord) -> Option<HeuristicOverride> {
    let summary = trial.failure_enrichment.as_ref()?.sae_summary()?;

    if summary.total_deaths > 0 {
        return Some(HeuristicOverride {
            reason: format!(
                "Heuristic override: {} death(s) reported in trial",
                summary.total_deaths
            ),
            sae_summary: summary.clone(),
        });
    }

    if summary.sae_rate > 0.1 {
        return Some(HeuristicOverride {
            reason: format!(
                "Heuristic override: SAE rate {:.1}% exceeds 10% threshold",
                summary.sae_rate * 100.0
            ),
            sae_summary: summary.clone(),
        });
    }

    if summary.has_safety_signal {
        return Some(HeuristicOverride {
            reason: format!(
                "Heuristic override: Serious adverse events ({}/{} affected)",
                summary.total_serious_affected, summary.total_serious_at_risk
            ),
            sae_summary: summary.clone(),
        });
    }

    None
}
