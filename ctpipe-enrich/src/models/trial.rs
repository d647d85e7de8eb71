//! Trial record and per-stage enrichment status
//!
//! Each trial carries an embedded status map tracking its four enrichment
//! stages independently. The map is only ever written back as a whole
//! (read-modify-write), never as a single-field patch, so concurrent
//! writers to sibling stages cannot lose each other's updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::LlmAnalysis;
use super::enrichment::{FailureEnrichment, PpiEnrichment, TargetEnrichment};

/// Enrichment stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Target/activity lookup (primary connector + protein-registry fallback)
    Targets,
    /// Protein-interaction network enrichment (requires `targets` completed)
    Ppi,
    /// Multi-source failure detail enrichment (independent of `targets`)
    FailureDetails,
    /// Two-pass LLM failure classification (requires `failure_details` completed)
    LlmAnalysis,
}

impl Stage {
    /// All stages in forward-sweep processing order
    pub const ALL: [Stage; 4] = [
        Stage::Targets,
        Stage::Ppi,
        Stage::FailureDetails,
        Stage::LlmAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Targets => "targets",
            Stage::Ppi => "ppi",
            Stage::FailureDetails => "failure_details",
            Stage::LlmAnalysis => "llm_analysis",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "targets" => Some(Stage::Targets),
            "ppi" => Some(Stage::Ppi),
            "failure_details" => Some(Stage::FailureDetails),
            "llm_analysis" => Some(Stage::LlmAnalysis),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one enrichment stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not yet attempted, or awaiting retry
    Pending,
    /// Stage executor succeeded and its payload is persisted
    Completed,
    /// Retry ceiling exhausted, permanently failed
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
        }
    }
}

/// Per-record enrichment status map
///
/// Value type with an explicit merge (`with_stage`): callers must re-read
/// the full map immediately before writing it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentStatus {
    pub targets: StageStatus,
    pub ppi: StageStatus,
    pub failure_details: StageStatus,
    pub llm_analysis: StageStatus,
    pub last_updated: DateTime<Utc>,
}

impl EnrichmentStatus {
    /// Fresh status map with every stage pending
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            targets: StageStatus::Pending,
            ppi: StageStatus::Pending,
            failure_details: StageStatus::Pending,
            llm_analysis: StageStatus::Pending,
            last_updated: now,
        }
    }

    pub fn stage(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Targets => self.targets,
            Stage::Ppi => self.ppi,
            Stage::FailureDetails => self.failure_details,
            Stage::LlmAnalysis => self.llm_analysis,
        }
    }

    /// Produce a whole new map with one stage replaced
    pub fn with_stage(&self, stage: Stage, status: StageStatus, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        match stage {
            Stage::Targets => next.targets = status,
            Stage::Ppi => next.ppi = status,
            Stage::FailureDetails => next.failure_details = status,
            Stage::LlmAnalysis => next.llm_analysis = status,
        }
        next.last_updated = now;
        next
    }
}

/// Seed record supplied by the upstream registry query (ingestion boundary)
///
/// All fields optional except the identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRecord {
    pub nct_id: String,
    pub drug_name: Option<String>,
    pub title: Option<String>,
    pub intervention_type: Option<String>,
    pub drug_description: Option<String>,
    pub phase: Option<String>,
    pub overall_status: Option<String>,
    pub why_stopped: Option<String>,
    pub sponsor: Option<String>,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
}

/// One trial record from the record store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// External identifier (immutable)
    pub nct_id: String,

    // Descriptive fields, write-once at ingestion
    pub drug_name: Option<String>,
    pub title: Option<String>,
    pub intervention_type: Option<String>,
    pub drug_description: Option<String>,
    pub phase: Option<String>,
    pub overall_status: Option<String>,
    pub why_stopped: Option<String>,
    pub sponsor: Option<String>,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,

    /// Per-stage status map, mutated only as a whole
    pub enrichment_status: EnrichmentStatus,

    // Enrichment payloads, one per stage, written on stage completion
    pub target_enrichment: Option<TargetEnrichment>,
    pub ppi_enrichment: Option<PpiEnrichment>,
    pub failure_enrichment: Option<FailureEnrichment>,
    pub llm_analysis: Option<LlmAnalysis>,

    pub created_at: DateTime<Utc>,
}

impl TrialRecord {
    /// Build a fresh record from a seed, all stages pending
    pub fn from_seed(seed: SeedRecord, now: DateTime<Utc>) -> Self {
        Self {
            nct_id: seed.nct_id,
            drug_name: seed.drug_name,
            title: seed.title,
            intervention_type: seed.intervention_type,
            drug_description: seed.drug_description,
            phase: seed.phase,
            overall_status: seed.overall_status,
            why_stopped: seed.why_stopped,
            sponsor: seed.sponsor,
            start_date: seed.start_date,
            completion_date: seed.completion_date,
            enrichment_status: EnrichmentStatus::new(now),
            target_enrichment: None,
            ppi_enrichment: None,
            failure_enrichment: None,
            llm_analysis: None,
            created_at: now,
        }
    }

    /// Unique protein identifiers cross-referenced by the target payload
    pub fn uniprot_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(enrichment) = &self.target_enrichment {
            if enrichment.has_uniprot_targets {
                for target in &enrichment.targets {
                    if let Some(uid) = &target.uniprot_id {
                        if !ids.contains(uid) {
                            ids.push(uid.clone());
                        }
                    }
                }
            }
        }
        ids
    }

    /// All nM-standardized binding measurements across targets
    pub fn ic50_values_nm(&self) -> Vec<f64> {
        let mut values = Vec::new();
        if let Some(enrichment) = &self.target_enrichment {
            for target in &enrichment.targets {
                for ic50 in &target.ic50_values {
                    if ic50.units == "nM" {
                        values.push(ic50.value);
                    }
                }
            }
        }
        values
    }
}
