//! Export filter tests: gating, strict validation with auditable drop
//! reasons, and atomic dataset writes.

mod helpers;

use chrono::Utc;
use sqlx::SqlitePool;

use ctpipe_enrich::db::trials;
use ctpipe_enrich::export::{DatasetExporter, ExportOptions};
use ctpipe_enrich::models::enrichment::{
    NetworkFeatures, PpiEnrichment, PpiInteraction, TargetEnrichment,
};
use ctpipe_enrich::models::{
    Confidence, DrugTarget, FailureCategory, Ic50Measurement, LlmAnalysis, Stage,
};

use helpers::*;

fn target_payload(with_uniprot: bool) -> TargetEnrichment {
    TargetEnrichment {
        found: true,
        chembl_id: Some("CHEMBL25".to_string()),
        pref_name: None,
        search_name: "examplinib".to_string(),
        drugbank_fallback: false,
        targets: if with_uniprot {
            vec![DrugTarget {
                chembl_id: Some("CHEMBL204".to_string()),
                uniprot_id: Some("P00533".to_string()),
                ic50_values: vec![
                    Ic50Measurement {
                        value: 12.0,
                        units: "nM".to_string(),
                    },
                    Ic50Measurement {
                        value: 48.0,
                        units: "nM".to_string(),
                    },
                ],
                source: None,
            }]
        } else {
            vec![]
        },
        has_uniprot_targets: with_uniprot,
    }
}

fn ppi_payload(edges: usize) -> PpiEnrichment {
    let interactions: Vec<PpiInteraction> = (0..edges)
        .map(|i| PpiInteraction {
            protein_a: format!("P{}", i),
            protein_b: format!("P{}", i + 1),
            combined_score: Some(0.9),
            interaction_type: "physical".to_string(),
        })
        .collect();
    let network_features = NetworkFeatures::from_interactions(&interactions);
    PpiEnrichment {
        uniprot_count: if edges > 0 { 1 } else { 0 },
        interactions,
        network_features,
    }
}

fn analysis_payload(category: FailureCategory, confidence: Confidence) -> LlmAnalysis {
    LlmAnalysis {
        classification: category,
        confidence,
        reasoning: "test reasoning".to_string(),
        heuristic_override: false,
        verification_passed: true,
        contradictions_found: vec![],
        sae_summary: None,
        analysis_timestamp: Utc::now(),
        model: Some("mock-model".to_string()),
        tokens_used: 300,
        cost_usd: 0.0027,
    }
}

/// Insert one fully-enriched record directly through the record store
async fn insert_enriched(
    pool: &SqlitePool,
    nct_id: &str,
    with_uniprot: bool,
    ppi_edges: usize,
    category: FailureCategory,
    confidence: Confidence,
) {
    trials::upsert_seed(pool, &seed(nct_id, "examplinib")).await.unwrap();

    let targets = serde_json::to_string(&target_payload(with_uniprot)).unwrap();
    trials::complete_stage(pool, nct_id, Stage::Targets, targets)
        .await
        .unwrap();

    let ppi = serde_json::to_string(&ppi_payload(ppi_edges)).unwrap();
    trials::complete_stage(pool, nct_id, Stage::Ppi, ppi).await.unwrap();

    let details = serde_json::to_string(&failure_enrichment_quiet()).unwrap();
    trials::complete_stage(pool, nct_id, Stage::FailureDetails, details)
        .await
        .unwrap();

    let analysis = serde_json::to_string(&analysis_payload(category, confidence)).unwrap();
    trials::complete_stage(pool, nct_id, Stage::LlmAnalysis, analysis)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_export_includes_only_classified_records() {
    let (pool, dir) = scratch_pool().await;
    insert_enriched(
        &pool,
        "NCT04000001",
        true,
        3,
        FailureCategory::Efficacy,
        Confidence::High,
    )
    .await;
    // Classification never completed for this one
    trials::upsert_seed(&pool, &seed("NCT04000002", "otherdrug"))
        .await
        .unwrap();

    let output = dir.path().join("dataset.json");
    let exporter = DatasetExporter::new(pool.clone());
    let report = exporter
        .export_dataset(&output, &ExportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_enriched, 1);
    assert_eq!(report.exported, 1);

    let content = std::fs::read_to_string(&output).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["nct_id"], "NCT04000001");
    assert_eq!(records[0]["failure_category"], "FAILURE_EFFICACY");
    assert_eq!(records[0]["min_ic50"], 12.0);
    assert_eq!(records[0]["max_ic50"], 48.0);
    assert_eq!(records[0]["avg_ic50"], 30.0);
    assert_eq!(records[0]["sponsor_type"], "industry");
}

#[tokio::test]
async fn test_confidence_and_target_gates() {
    let (pool, dir) = scratch_pool().await;
    insert_enriched(&pool, "NCT04000003", true, 3, FailureCategory::Safety, Confidence::High).await;
    insert_enriched(&pool, "NCT04000004", true, 3, FailureCategory::Efficacy, Confidence::Low).await;
    insert_enriched(&pool, "NCT04000005", false, 0, FailureCategory::Efficacy, Confidence::High).await;

    let exporter = DatasetExporter::new(pool.clone());

    let output = dir.path().join("confident.json");
    let report = exporter
        .export_dataset(
            &output,
            &ExportOptions {
                min_confidence: Confidence::Medium,
                require_targets: false,
                validation_mode: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.exported, 2);
    assert_eq!(report.dropped.get("below_min_confidence"), Some(&1));

    let output = dir.path().join("targeted.json");
    let report = exporter
        .export_dataset(
            &output,
            &ExportOptions {
                min_confidence: Confidence::Low,
                require_targets: true,
                validation_mode: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.exported, 2);
    assert_eq!(report.dropped.get("missing_uniprot_targets"), Some(&1));
}

#[tokio::test]
async fn test_validation_mode_drops_with_named_reasons() {
    let (pool, dir) = scratch_pool().await;
    // Survives every requirement
    insert_enriched(&pool, "NCT04000006", true, 3, FailureCategory::Safety, Confidence::High).await;
    // No protein cross-references
    insert_enriched(&pool, "NCT04000007", false, 3, FailureCategory::Efficacy, Confidence::High).await;
    // Empty interaction network
    insert_enriched(&pool, "NCT04000008", true, 0, FailureCategory::Efficacy, Confidence::High).await;
    // Low-confidence safety classification
    insert_enriched(&pool, "NCT04000009", true, 3, FailureCategory::Safety, Confidence::Low).await;

    let output = dir.path().join("validation.json");
    let exporter = DatasetExporter::new(pool.clone());
    let report = exporter
        .export_dataset(
            &output,
            &ExportOptions {
                min_confidence: Confidence::Low,
                require_targets: false,
                validation_mode: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.total_enriched, 4);
    assert_eq!(report.exported, 1);
    assert_eq!(report.dropped.get("missing_uniprot_targets"), Some(&1));
    assert_eq!(report.dropped.get("missing_ppi_network"), Some(&1));
    assert_eq!(
        report.dropped.get("low_confidence_safety_classification"),
        Some(&1)
    );

    let content = std::fs::read_to_string(&output).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
    assert_eq!(records[0]["nct_id"], "NCT04000006");
}

#[tokio::test]
async fn test_export_write_is_atomic() {
    let (pool, dir) = scratch_pool().await;
    insert_enriched(&pool, "NCT04000010", true, 3, FailureCategory::Efficacy, Confidence::High).await;

    let output = dir.path().join("exports").join("dataset.json");
    let exporter = DatasetExporter::new(pool.clone());
    exporter
        .export_dataset(&output, &ExportOptions::default())
        .await
        .unwrap();

    assert!(output.exists());
    // No temp artifact left beside the dataset
    let leftovers: Vec<_> = std::fs::read_dir(output.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "dataset.json")
        .collect();
    assert!(leftovers.is_empty(), "temp files must not survive the rename");
}

#[tokio::test]
async fn test_ppi_focus_export_adds_topology_features() {
    let (pool, dir) = scratch_pool().await;
    insert_enriched(&pool, "NCT04000011", true, 3, FailureCategory::Safety, Confidence::High).await;
    // Below the confidence requirement for the focused dataset
    insert_enriched(&pool, "NCT04000012", true, 3, FailureCategory::Efficacy, Confidence::Low).await;

    let output = dir.path().join("ppi_focus.json");
    let exporter = DatasetExporter::new(pool.clone());
    let report = exporter.export_ppi_focus(&output).await.unwrap();

    assert_eq!(report.exported, 1);
    assert_eq!(report.dropped.get("below_ppi_focus_requirements"), Some(&1));

    let content = std::fs::read_to_string(&output).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["ppi_edge_count"], 3);
    // Chain of 3 edges touches 4 distinct proteins
    assert_eq!(records[0]["ppi_protein_count"], 4);
    // One target with a sub-100nM measurement
    assert_eq!(records[0]["strong_binder_count"], 1);
    assert_eq!(records[0]["is_safety_failure"], true);
    assert_eq!(records[0]["is_efficacy_failure"], false);
}
