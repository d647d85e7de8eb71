//! Shared test helpers: scratch databases, seed records, and mock
//! connectors/model clients.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tempfile::TempDir;

use ctpipe_enrich::analysis::llm::{LlmClient, LlmResponse};
use ctpipe_enrich::connectors::{
    ConnectorError, ConnectorSet, InteractionSource, LiteratureSource, StudyRegistry,
    TargetLookup, TargetSource,
};
use ctpipe_enrich::db;
use ctpipe_enrich::models::enrichment::{
    AdverseEventData, CtGovStudy, DoseInfo, FailureEnrichment, SaeSummary, SeriousEventGroup,
};
use ctpipe_enrich::models::{
    DrugTarget, Ic50Measurement, PpiInteraction, PubmedRef, SeedRecord,
};

/// Fresh SQLite database in a scratch directory
pub async fn scratch_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let pool = db::init_database_pool(&dir.path().join("test.db"))
        .await
        .expect("init database");
    (pool, dir)
}

/// Minimal seed record
pub fn seed(nct_id: &str, drug_name: &str) -> SeedRecord {
    SeedRecord {
        nct_id: nct_id.to_string(),
        drug_name: Some(drug_name.to_string()),
        title: Some(format!("A study of {}", drug_name)),
        intervention_type: Some("DRUG".to_string()),
        drug_description: None,
        phase: Some("PHASE1".to_string()),
        overall_status: Some("TERMINATED".to_string()),
        why_stopped: None,
        sponsor: Some("Acme Pharma Inc".to_string()),
        start_date: Some("2018-03-01".to_string()),
        completion_date: None,
    }
}

/// Target lookup carrying one protein cross-reference with potency data
pub fn lookup_with_uniprot() -> TargetLookup {
    TargetLookup {
        source_id: Some("CHEMBL25".to_string()),
        pref_name: Some("EXAMPLINIB".to_string()),
        targets: vec![DrugTarget {
            chembl_id: Some("CHEMBL204".to_string()),
            uniprot_id: Some("P00533".to_string()),
            ic50_values: vec![Ic50Measurement {
                value: 12.0,
                units: "nM".to_string(),
            }],
            source: None,
        }],
    }
}

/// Failure enrichment with a serious-adverse-event group
pub fn failure_enrichment_with_sae(
    deaths: u64,
    serious_affected: u64,
    serious_at_risk: u64,
) -> FailureEnrichment {
    let groups = vec![SeriousEventGroup {
        title: Some("Treatment arm".to_string()),
        deaths,
        serious_affected,
        serious_at_risk,
        events: vec![],
    }];
    let summary = SaeSummary::from_groups(&groups);

    FailureEnrichment {
        registry_description: Some("The study was terminated early.".to_string()),
        registry_documents: vec![],
        pubmed_results: vec![],
        ctgov: Some(CtGovStudy {
            has_results: true,
            brief_summary: None,
            detailed_description: None,
            adverse_events: AdverseEventData {
                found: true,
                frequency_threshold: None,
                time_frame: None,
                description: None,
                serious_events: groups,
                other_events: vec![],
                summary,
            },
            dose_info: DoseInfo::not_found(),
        }),
        company_search_urls: vec![],
    }
}

/// Failure enrichment with no adverse-event data at all
pub fn failure_enrichment_quiet() -> FailureEnrichment {
    FailureEnrichment {
        registry_description: Some("Insufficient response rates were observed.".to_string()),
        ..Default::default()
    }
}

// ============================================================================
// Mock connectors
// ============================================================================

/// Target source returning a fixed lookup on every call
pub struct StaticTargetSource {
    pub lookup: Option<TargetLookup>,
    pub calls: AtomicUsize,
}

impl StaticTargetSource {
    pub fn new(lookup: Option<TargetLookup>) -> Self {
        Self {
            lookup,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl TargetSource for StaticTargetSource {
    fn name(&self) -> &'static str {
        "mock_targets"
    }

    async fn lookup_targets(
        &self,
        _drug_name: &str,
    ) -> Result<Option<TargetLookup>, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup.clone())
    }
}

/// Target source that times out N times before succeeding
pub struct FlakyTargetSource {
    pub failures_remaining: AtomicU32,
    pub then: Option<TargetLookup>,
    pub calls: AtomicUsize,
}

impl FlakyTargetSource {
    pub fn new(failures: u32, then: Option<TargetLookup>) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            then,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl TargetSource for FlakyTargetSource {
    fn name(&self) -> &'static str {
        "flaky_targets"
    }

    async fn lookup_targets(
        &self,
        _drug_name: &str,
    ) -> Result<Option<TargetLookup>, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ConnectorError::Timeout("simulated timeout".to_string()));
        }
        Ok(self.then.clone())
    }
}

/// Interaction source returning fixed edges for every identifier
pub struct StaticInteractions {
    pub edges: Vec<PpiInteraction>,
}

impl StaticInteractions {
    pub fn triangle() -> Self {
        let edge = |a: &str, b: &str| PpiInteraction {
            protein_a: a.to_string(),
            protein_b: b.to_string(),
            combined_score: Some(0.9),
            interaction_type: "physical".to_string(),
        };
        Self {
            edges: vec![edge("EGFR", "GRB2"), edge("GRB2", "SOS1"), edge("SOS1", "EGFR")],
        }
    }
}

#[async_trait::async_trait]
impl InteractionSource for StaticInteractions {
    async fn interactions(
        &self,
        _protein_id: &str,
    ) -> Result<Vec<PpiInteraction>, ConnectorError> {
        Ok(self.edges.clone())
    }
}

/// Literature source with fixed results
pub struct StaticLiterature {
    pub refs: Vec<PubmedRef>,
}

#[async_trait::async_trait]
impl LiteratureSource for StaticLiterature {
    async fn search(
        &self,
        _nct_id: &str,
        _drug_name: &str,
    ) -> Result<Vec<PubmedRef>, ConnectorError> {
        Ok(self.refs.clone())
    }
}

/// Study registry with a fixed study record
pub struct StaticStudy {
    pub study: Option<CtGovStudy>,
}

#[async_trait::async_trait]
impl StudyRegistry for StaticStudy {
    async fn fetch_study(&self, _nct_id: &str) -> Result<Option<CtGovStudy>, ConnectorError> {
        Ok(self.study.clone())
    }
}

/// Connector set with the given target and interaction sources; the rest
/// are quiet mocks
pub fn mock_connectors(
    targets: Arc<dyn TargetSource>,
    interactions: Arc<dyn InteractionSource>,
) -> ConnectorSet {
    ConnectorSet {
        normalizer: None,
        targets_primary: targets,
        targets_fallback: None,
        interactions,
        literature: Arc::new(StaticLiterature { refs: vec![] }),
        study_registry: Arc::new(StaticStudy { study: None }),
        trial_registry: None,
    }
}

// ============================================================================
// Scripted model client
// ============================================================================

/// One scripted model turn
pub enum LlmTurn {
    Text(&'static str),
    Fail,
}

/// Model client that replays a script and counts calls
pub struct ScriptedLlm {
    pub calls: AtomicUsize,
    script: Mutex<VecDeque<LlmTurn>>,
}

impl ScriptedLlm {
    pub fn new(turns: Vec<LlmTurn>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(turns.into()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<LlmResponse, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let turn = self.script.lock().expect("script lock").pop_front();
        match turn {
            Some(LlmTurn::Text(text)) => Ok(LlmResponse {
                text: text.to_string(),
                model: "mock-model".to_string(),
                input_tokens: 100,
                output_tokens: 50,
            }),
            Some(LlmTurn::Fail) => {
                Err(ConnectorError::Timeout("simulated model timeout".to_string()))
            }
            None => Err(ConnectorError::Api(500, "script exhausted".to_string())),
        }
    }
}
