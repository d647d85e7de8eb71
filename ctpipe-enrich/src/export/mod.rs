//! Dataset export
//!
//! Selects records whose classification is completed, applies the
//! confidence/target/validation gates, flattens each survivor into one
//! feature record, and writes the dataset atomically (temp file + rename,
//! so no partially-written file is ever observable). Dropped records are
//! recorded per named reason for auditability, never silently discarded.

pub mod sponsor;

pub use sponsor::{classify_sponsor, SponsorType};

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use ctpipe_common::{Error, Result};

use crate::db::trials;
use crate::models::{
    Confidence, DrugTarget, FailureCategory, PpiInteraction, TrialRecord,
};

/// Export gates, applied in order
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Minimum confidence (ordinal `low < medium < high`)
    pub min_confidence: Confidence,
    /// Keep only records with protein cross-referenced targets
    pub require_targets: bool,
    /// Strict completeness enforcement for validation datasets
    pub validation_mode: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            min_confidence: Confidence::Low,
            require_targets: false,
            validation_mode: false,
        }
    }
}

/// One flat feature record in the exported dataset
#[derive(Debug, Clone, Serialize)]
pub struct MlRecord {
    // Identifiers
    pub nct_id: String,
    pub drug_name: Option<String>,

    // Labels
    pub failure_category: Option<FailureCategory>,
    pub confidence: Confidence,
    pub label_reasoning: String,
    /// Provenance: deterministic override vs model classification
    pub heuristic_override: bool,

    // Target features
    pub target_count: usize,
    pub has_uniprot_targets: bool,
    pub uniprot_ids: Vec<String>,

    // Potency features (nM-standardized measurements)
    pub ic50_count: usize,
    pub min_ic50: Option<f64>,
    pub max_ic50: Option<f64>,
    pub avg_ic50: Option<f64>,

    // Interaction-network features
    pub ppi_network_size: usize,
    pub ppi_avg_degree: f64,
    pub ppi_clustering_coefficient: f64,

    // Trial metadata
    pub sponsor: Option<String>,
    pub sponsor_type: SponsorType,
    pub phase: Option<String>,
    pub overall_status: Option<String>,
    pub why_stopped: Option<String>,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,

    // Raw payloads for downstream feature engineering
    pub ppi_interactions: Vec<PpiInteraction>,
    pub chembl_targets: Vec<DrugTarget>,
}

/// Interaction-focused record with network-topology extras
#[derive(Debug, Clone, Serialize)]
pub struct PpiFocusRecord {
    #[serde(flatten)]
    pub base: MlRecord,
    pub ppi_protein_count: usize,
    pub ppi_edge_count: usize,
    /// Targets with at least one sub-100nM measurement
    pub strong_binder_count: usize,
    pub is_safety_failure: bool,
    pub is_efficacy_failure: bool,
}

/// Export outcome, including the audit trail of dropped records
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub total_enriched: usize,
    pub exported: usize,
    /// Drop reason → count
    pub dropped: BTreeMap<String, usize>,
    pub category_counts: BTreeMap<String, usize>,
    pub confidence_counts: BTreeMap<String, usize>,
    pub sponsor_type_counts: BTreeMap<String, usize>,
}

/// Dataset exporter over the record store
pub struct DatasetExporter {
    db: SqlitePool,
}

impl DatasetExporter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Export the quality-filtered dataset to `output`
    pub async fn export_dataset(
        &self,
        output: &Path,
        options: &ExportOptions,
    ) -> Result<ExportReport> {
        let complete = trials::load_analysis_completed(&self.db).await?;
        let mut report = ExportReport {
            total_enriched: complete.len(),
            ..Default::default()
        };

        let mut survivors = Vec::new();
        for trial in &complete {
            match apply_filters(trial, options) {
                Ok(()) => survivors.push(trial),
                Err(reason) => {
                    *report.dropped.entry(reason.to_string()).or_insert(0) += 1;
                    tracing::debug!(nct_id = %trial.nct_id, reason, "Record dropped from export");
                }
            }
        }

        let records: Vec<MlRecord> = survivors.iter().map(|t| build_ml_record(t)).collect();
        report.exported = records.len();
        tally(&records, &mut report);

        write_atomic(output, &records)?;

        tracing::info!(
            total_enriched = report.total_enriched,
            exported = report.exported,
            dropped = report.dropped.values().sum::<usize>(),
            output = %output.display(),
            "Dataset exported"
        );
        for (reason, count) in &report.dropped {
            tracing::info!(reason = %reason, count, "Dropped records");
        }

        Ok(report)
    }

    /// Export the interaction-focused dataset: records with targets, a
    /// non-empty network, and medium-or-higher confidence
    pub async fn export_ppi_focus(&self, output: &Path) -> Result<ExportReport> {
        let complete = trials::load_analysis_completed(&self.db).await?;
        let mut report = ExportReport {
            total_enriched: complete.len(),
            ..Default::default()
        };

        let mut records = Vec::new();
        for trial in &complete {
            let has_targets = trial
                .target_enrichment
                .as_ref()
                .map(|t| t.has_uniprot_targets)
                .unwrap_or(false);
            let has_network = trial
                .ppi_enrichment
                .as_ref()
                .map(|p| p.uniprot_count > 0)
                .unwrap_or(false);
            let confident = trial
                .llm_analysis
                .as_ref()
                .map(|a| a.confidence >= Confidence::Medium)
                .unwrap_or(false);

            if !(has_targets && has_network && confident) {
                *report
                    .dropped
                    .entry("below_ppi_focus_requirements".to_string())
                    .or_insert(0) += 1;
                continue;
            }

            let base = build_ml_record(trial);

            let mut proteins: Vec<&str> = Vec::new();
            for edge in &base.ppi_interactions {
                if !proteins.contains(&edge.protein_a.as_str()) {
                    proteins.push(&edge.protein_a);
                }
                if !proteins.contains(&edge.protein_b.as_str()) {
                    proteins.push(&edge.protein_b);
                }
            }

            let strong_binder_count = base
                .chembl_targets
                .iter()
                .filter(|t| {
                    t.ic50_values
                        .iter()
                        .any(|m| m.units == "nM" && m.value < 100.0)
                })
                .count();

            records.push(PpiFocusRecord {
                ppi_protein_count: proteins.len(),
                ppi_edge_count: base.ppi_interactions.len(),
                strong_binder_count,
                is_safety_failure: base.failure_category == Some(FailureCategory::Safety),
                is_efficacy_failure: base.failure_category == Some(FailureCategory::Efficacy),
                base,
            });
        }

        report.exported = records.len();
        write_atomic(output, &records)?;

        tracing::info!(
            exported = report.exported,
            output = %output.display(),
            "Interaction-focused dataset exported"
        );

        Ok(report)
    }
}

/// Apply the export gates in order; returns the drop reason on rejection
fn apply_filters(trial: &TrialRecord, options: &ExportOptions) -> std::result::Result<(), &'static str> {
    let confidence = trial
        .llm_analysis
        .as_ref()
        .map(|a| a.confidence)
        .unwrap_or(Confidence::Low);

    if confidence < options.min_confidence {
        return Err("below_min_confidence");
    }

    let has_uniprot_targets = trial
        .target_enrichment
        .as_ref()
        .map(|t| t.has_uniprot_targets)
        .unwrap_or(false);

    if options.require_targets && !has_uniprot_targets {
        return Err("missing_uniprot_targets");
    }

    if options.validation_mode {
        check_validation_completeness(trial)?;
    }

    Ok(())
}

/// Strict completeness requirements for validation datasets
fn check_validation_completeness(trial: &TrialRecord) -> std::result::Result<(), &'static str> {
    let target_enrichment = trial.target_enrichment.as_ref();
    let ppi_enrichment = trial.ppi_enrichment.as_ref();
    let analysis = trial.llm_analysis.as_ref();

    // Requirement 1: protein cross-referenced targets
    if !target_enrichment.map(|t| t.has_uniprot_targets).unwrap_or(false) {
        return Err("missing_uniprot_targets");
    }

    // Requirement 2: non-empty interaction network
    if ppi_enrichment.map(|p| p.uniprot_count).unwrap_or(0) == 0 {
        return Err("missing_ppi_network");
    }

    // Requirement 3: a failure classification must be present
    let Some(analysis) = analysis else {
        return Err("invalid_failure_category");
    };

    // Requirement 4: safety classifications need medium-or-higher confidence
    if analysis.classification == FailureCategory::Safety
        && analysis.confidence == Confidence::Low
    {
        return Err("low_confidence_safety_classification");
    }

    // Requirement 5: at least one target entry
    if target_enrichment.map(|t| t.targets.len()).unwrap_or(0) == 0 {
        return Err("no_target_data");
    }

    Ok(())
}

/// Flatten one trial into a feature record
fn build_ml_record(trial: &TrialRecord) -> MlRecord {
    let uniprot_ids = trial.uniprot_ids();
    let ic50_values = trial.ic50_values_nm();

    let min_ic50 = ic50_values.iter().cloned().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.min(v)))
    });
    let max_ic50 = ic50_values.iter().cloned().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });
    let avg_ic50 = if ic50_values.is_empty() {
        None
    } else {
        Some(ic50_values.iter().sum::<f64>() / ic50_values.len() as f64)
    };

    let targets = trial
        .target_enrichment
        .as_ref()
        .map(|t| t.targets.clone())
        .unwrap_or_default();
    let has_uniprot_targets = trial
        .target_enrichment
        .as_ref()
        .map(|t| t.has_uniprot_targets)
        .unwrap_or(false);

    let interactions = trial
        .ppi_enrichment
        .as_ref()
        .map(|p| p.interactions.clone())
        .unwrap_or_default();
    let (avg_degree, clustering) = trial
        .ppi_enrichment
        .as_ref()
        .map(|p| {
            (
                p.network_features.avg_degree,
                p.network_features.clustering_coefficient,
            )
        })
        .unwrap_or((0.0, 0.0));

    MlRecord {
        nct_id: trial.nct_id.clone(),
        drug_name: trial.drug_name.clone(),
        failure_category: trial.llm_analysis.as_ref().map(|a| a.classification),
        confidence: trial
            .llm_analysis
            .as_ref()
            .map(|a| a.confidence)
            .unwrap_or(Confidence::Low),
        label_reasoning: trial
            .llm_analysis
            .as_ref()
            .map(|a| a.reasoning.clone())
            .unwrap_or_default(),
        heuristic_override: trial
            .llm_analysis
            .as_ref()
            .map(|a| a.heuristic_override)
            .unwrap_or(false),
        target_count: targets.len(),
        has_uniprot_targets,
        uniprot_ids,
        ic50_count: ic50_values.len(),
        min_ic50,
        max_ic50,
        avg_ic50,
        ppi_network_size: interactions.len(),
        ppi_avg_degree: avg_degree,
        ppi_clustering_coefficient: clustering,
        sponsor: trial.sponsor.clone(),
        sponsor_type: classify_sponsor(trial.sponsor.as_deref()),
        phase: trial.phase.clone(),
        overall_status: trial.overall_status.clone(),
        why_stopped: trial.why_stopped.clone(),
        start_date: trial.start_date.clone(),
        completion_date: trial.completion_date.clone(),
        ppi_interactions: interactions,
        chembl_targets: targets,
    }
}

fn tally(records: &[MlRecord], report: &mut ExportReport) {
    for record in records {
        let category = record
            .failure_category
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        *report.category_counts.entry(category).or_insert(0) += 1;
        *report
            .confidence_counts
            .entry(record.confidence.as_str().to_string())
            .or_insert(0) += 1;
        *report
            .sponsor_type_counts
            .entry(record.sponsor_type.as_str().to_string())
            .or_insert(0) += 1;
    }
}

/// Write the dataset atomically: temp path in the same directory, then
/// rename over the final path
fn write_atomic<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(records)
        .map_err(|e| Error::Internal(format!("Failed to serialize dataset: {}", e)))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}
