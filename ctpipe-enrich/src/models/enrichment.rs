//! Stage enrichment payload types
//!
//! One structured blob per stage, serialized to JSON TEXT columns in the
//! record store. Payloads are written exactly once per stage completion;
//! a retried stage overwrites the whole blob (idempotent).

use serde::{Deserialize, Serialize};

// ============================================================================
// Target enrichment (stage `targets`)
// ============================================================================

/// Binding measurement, normalized units preserved from the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ic50Measurement {
    pub value: f64,
    pub units: String,
}

/// One drug target with its protein cross-reference and potency data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugTarget {
    /// ChEMBL target identifier (absent for fallback-sourced targets)
    pub chembl_id: Option<String>,
    /// UniProt accession cross-reference
    pub uniprot_id: Option<String>,
    pub ic50_values: Vec<Ic50Measurement>,
    /// Provenance marker for fallback-sourced targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result of the target/activity enrichment stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEnrichment {
    /// Whether any source produced a usable match. `false` is still a
    /// completed stage: the connector call itself succeeded.
    pub found: bool,
    pub chembl_id: Option<String>,
    pub pref_name: Option<String>,
    /// Name actually searched (post-normalization)
    pub search_name: String,
    /// Set when the secondary protein-registry fallback supplied the targets
    pub drugbank_fallback: bool,
    pub targets: Vec<DrugTarget>,
    pub has_uniprot_targets: bool,
}

impl TargetEnrichment {
    /// Empty "nothing found" payload for a searched name
    pub fn not_found(search_name: String) -> Self {
        Self {
            found: false,
            chembl_id: None,
            pref_name: None,
            search_name,
            drugbank_fallback: false,
            targets: Vec::new(),
            has_uniprot_targets: false,
        }
    }
}

// ============================================================================
// Interaction-network enrichment (stage `ppi`)
// ============================================================================

/// One protein-protein interaction edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpiInteraction {
    pub protein_a: String,
    pub protein_b: String,
    pub combined_score: Option<f64>,
    pub interaction_type: String,
}

/// Summary statistics over the accumulated edge list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFeatures {
    /// Mean node degree over the adjacency built from the edge list
    pub avg_degree: f64,
    /// Interaction-density proxy: edges / nodes
    pub clustering_coefficient: f64,
}

impl NetworkFeatures {
    /// Compute summary statistics from an edge list
    pub fn from_interactions(interactions: &[PpiInteraction]) -> Self {
        if interactions.is_empty() {
            return Self {
                avg_degree: 0.0,
                clustering_coefficient: 0.0,
            };
        }

        let mut adjacency: std::collections::HashMap<&str, Vec<&str>> =
            std::collections::HashMap::new();
        for edge in interactions {
            adjacency
                .entry(edge.protein_a.as_str())
                .or_default()
                .push(edge.protein_b.as_str());
            adjacency
                .entry(edge.protein_b.as_str())
                .or_default()
                .push(edge.protein_a.as_str());
        }

        let degree_sum: usize = adjacency.values().map(|n| n.len()).sum();
        let avg_degree = degree_sum as f64 / adjacency.len() as f64;
        let clustering = interactions.len() as f64 / adjacency.len() as f64;

        Self {
            avg_degree: (avg_degree * 100.0).round() / 100.0,
            clustering_coefficient: (clustering * 100.0).round() / 100.0,
        }
    }
}

/// Result of the interaction-network enrichment stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpiEnrichment {
    /// Number of distinct protein identifiers queried
    pub uniprot_count: usize,
    pub interactions: Vec<PpiInteraction>,
    pub network_features: NetworkFeatures,
}

impl PpiEnrichment {
    /// Payload for records with zero qualifying protein identifiers
    pub fn empty() -> Self {
        Self {
            uniprot_count: 0,
            interactions: Vec::new(),
            network_features: NetworkFeatures {
                avg_degree: 0.0,
                clustering_coefficient: 0.0,
            },
        }
    }
}

// ============================================================================
// Failure-detail enrichment (stage `failure_details`)
// ============================================================================

/// Registry document pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub doc_type: Option<String>,
    pub url: Option<String>,
}

/// Literature search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubmedRef {
    pub pmid: String,
    pub title: Option<String>,
    /// First three author names
    pub authors: Vec<String>,
}

/// Serious-adverse-event summary metrics derived from the registry's
/// adverse events module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaeSummary {
    pub total_deaths: u64,
    pub total_serious_affected: u64,
    /// Maximum at-risk cohort size across serious event groups
    pub total_serious_at_risk: u64,
    pub sae_rate: f64,
    pub death_rate: f64,
    pub has_safety_signal: bool,
}

impl SaeSummary {
    /// Derive summary metrics from per-group serious event counts.
    ///
    /// Safety signal fires on any deaths or an SAE rate above 10%.
    pub fn from_groups(groups: &[SeriousEventGroup]) -> Self {
        let mut summary = SaeSummary::default();

        for group in groups {
            summary.total_deaths += group.deaths;
            summary.total_serious_affected += group.serious_affected;
            summary.total_serious_at_risk = summary.total_serious_at_risk.max(group.serious_at_risk);
        }

        if summary.total_serious_at_risk > 0 {
            summary.sae_rate =
                summary.total_serious_affected as f64 / summary.total_serious_at_risk as f64;
            summary.death_rate = summary.total_deaths as f64 / summary.total_serious_at_risk as f64;
        }

        summary.has_safety_signal = summary.sae_rate > 0.1 || summary.total_deaths > 0;
        summary
    }
}

/// One adverse event term within a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdverseEventTerm {
    pub term: Option<String>,
    pub organ_system: Option<String>,
    pub affected: u64,
    pub at_risk: u64,
}

/// Serious adverse event group (one study arm)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriousEventGroup {
    pub title: Option<String>,
    pub deaths: u64,
    pub serious_affected: u64,
    pub serious_at_risk: u64,
    pub events: Vec<AdverseEventTerm>,
}

/// Non-serious adverse event group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherEventGroup {
    pub title: Option<String>,
    pub affected: u64,
    pub at_risk: u64,
    pub events: Vec<AdverseEventTerm>,
}

/// Parsed adverse events module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdverseEventData {
    pub found: bool,
    pub frequency_threshold: Option<String>,
    pub time_frame: Option<String>,
    pub description: Option<String>,
    pub serious_events: Vec<SeriousEventGroup>,
    pub other_events: Vec<OtherEventGroup>,
    pub summary: SaeSummary,
}

impl AdverseEventData {
    pub fn not_found() -> Self {
        Self {
            found: false,
            frequency_threshold: None,
            time_frame: None,
            description: None,
            serious_events: Vec::new(),
            other_events: Vec::new(),
            summary: SaeSummary::default(),
        }
    }
}

/// Study arm group with dosing description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmGroup {
    pub label: Option<String>,
    pub arm_type: Option<String>,
    pub description: Option<String>,
    pub intervention_names: Vec<String>,
}

/// Intervention with dosing description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionInfo {
    pub intervention_type: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub arm_group_labels: Vec<String>,
}

/// Dosing information parsed from the study's arms/interventions module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseInfo {
    pub found: bool,
    pub arms: Vec<ArmGroup>,
    pub interventions: Vec<InterventionInfo>,
}

impl DoseInfo {
    pub fn not_found() -> Self {
        Self {
            found: false,
            arms: Vec::new(),
            interventions: Vec::new(),
        }
    }
}

/// Study record fetched from the public trial registry API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtGovStudy {
    pub has_results: bool,
    pub brief_summary: Option<String>,
    pub detailed_description: Option<String>,
    pub adverse_events: AdverseEventData,
    pub dose_info: DoseInfo,
}

/// Result of the failure-detail enrichment stage.
///
/// Every field is best-effort: a sub-source with no data leaves its field
/// empty without failing the stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureEnrichment {
    pub registry_description: Option<String>,
    pub registry_documents: Vec<RegistryDocument>,
    pub pubmed_results: Vec<PubmedRef>,
    pub ctgov: Option<CtGovStudy>,
    pub company_search_urls: Vec<String>,
}

impl FailureEnrichment {
    /// Adverse-event summary, when the registry reported results
    pub fn sae_summary(&self) -> Option<&SaeSummary> {
        self.ctgov
            .as_ref()
            .filter(|study| study.adverse_events.found)
            .map(|study| &study.adverse_events.summary)
    }
}
