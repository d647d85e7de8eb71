//! Orchestrator forward-sweep tests: stage completion, dependency
//! gating, idempotent re-runs, and empty-network fast paths.

mod helpers;

use std::sync::Arc;

use ctpipe_enrich::connectors::TargetLookup;
use ctpipe_enrich::db::trials;
use ctpipe_enrich::models::{Stage, StageStatus};
use ctpipe_enrich::orchestrator::EnrichmentOrchestrator;

use helpers::*;

#[tokio::test]
async fn test_forward_sweep_completes_all_enrichment_stages() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT01000001", "examplinib"))
        .await
        .unwrap();

    let connectors = mock_connectors(
        Arc::new(StaticTargetSource::new(Some(lookup_with_uniprot()))),
        Arc::new(StaticInteractions::triangle()),
    );
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    let stats = orchestrator.run_enrich_sweep().await.unwrap();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.queued, 0);

    let trial = trials::get_trial(&pool, "NCT01000001").await.unwrap().unwrap();
    assert_eq!(trial.enrichment_status.targets, StageStatus::Completed);
    assert_eq!(trial.enrichment_status.ppi, StageStatus::Completed);
    assert_eq!(trial.enrichment_status.failure_details, StageStatus::Completed);
    // Classification has not run
    assert_eq!(trial.enrichment_status.llm_analysis, StageStatus::Pending);

    let targets = trial.target_enrichment.unwrap();
    assert!(targets.found);
    assert!(targets.has_uniprot_targets);
    assert_eq!(targets.chembl_id.as_deref(), Some("CHEMBL25"));

    let ppi = trial.ppi_enrichment.unwrap();
    assert_eq!(ppi.uniprot_count, 1);
    assert_eq!(ppi.interactions.len(), 3);
    assert_eq!(ppi.network_features.avg_degree, 2.0);

    assert!(trial.failure_enrichment.is_some());
}

#[tokio::test]
async fn test_ppi_never_attempted_while_targets_pending() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT01000002", "examplinib"))
        .await
        .unwrap();

    // Target lookups always fail; interaction lookups would succeed
    let connectors = mock_connectors(
        Arc::new(FlakyTargetSource::new(u32::MAX, None)),
        Arc::new(StaticInteractions::triangle()),
    );
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    let stats = orchestrator.run_enrich_sweep().await.unwrap();
    assert_eq!(stats.queued, 1);

    let trial = trials::get_trial(&pool, "NCT01000002").await.unwrap().unwrap();
    // Failed attempt leaves the stage pending (only the retry ceiling
    // flips it to failed), and the dependent stage was never attempted
    assert_eq!(trial.enrichment_status.targets, StageStatus::Pending);
    assert_eq!(trial.enrichment_status.ppi, StageStatus::Pending);
    assert!(trial.ppi_enrichment.is_none());

    // Independent stage proceeded regardless
    assert_eq!(trial.enrichment_status.failure_details, StageStatus::Completed);

    let entry = orchestrator
        .queue()
        .entry_for("NCT01000002", Stage::Targets)
        .await
        .unwrap();
    assert!(entry.is_some());
    assert_eq!(entry.unwrap().retry_count, 0);
}

#[tokio::test]
async fn test_rerunning_sweep_is_idempotent() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT01000003", "examplinib"))
        .await
        .unwrap();

    let targets = Arc::new(StaticTargetSource::new(Some(lookup_with_uniprot())));
    let connectors = mock_connectors(targets.clone(), Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();
    let first = trials::get_trial(&pool, "NCT01000003").await.unwrap().unwrap();

    let stats = orchestrator.run_enrich_sweep().await.unwrap();
    assert_eq!(stats.processed, 0, "completed stages must not be re-run");

    let second = trials::get_trial(&pool, "NCT01000003").await.unwrap().unwrap();
    assert_eq!(first.target_enrichment, second.target_enrichment);
    assert_eq!(first.ppi_enrichment, second.ppi_enrichment);
    assert_eq!(first.failure_enrichment, second.failure_enrichment);
}

#[tokio::test]
async fn test_record_without_proteins_completes_ppi_empty() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT01000004", "examplinib"))
        .await
        .unwrap();

    // Molecule found, but no protein cross-references anywhere
    let lookup = TargetLookup {
        source_id: Some("CHEMBL25".to_string()),
        pref_name: None,
        targets: vec![],
    };
    let connectors = mock_connectors(
        Arc::new(StaticTargetSource::new(Some(lookup))),
        Arc::new(StaticInteractions::triangle()),
    );
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();

    let trial = trials::get_trial(&pool, "NCT01000004").await.unwrap().unwrap();
    // Zero qualifying identifiers is a completed stage, not a failure
    assert_eq!(trial.enrichment_status.ppi, StageStatus::Completed);
    let ppi = trial.ppi_enrichment.unwrap();
    assert_eq!(ppi.uniprot_count, 0);
    assert!(ppi.interactions.is_empty());
    assert!(orchestrator.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_connector_not_found_still_completes_targets() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT01000005", "obscuredrug"))
        .await
        .unwrap();

    // Connector call succeeds but finds nothing, and no fallback is wired
    let connectors = mock_connectors(
        Arc::new(StaticTargetSource::new(None)),
        Arc::new(StaticInteractions::triangle()),
    );
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();

    let trial = trials::get_trial(&pool, "NCT01000005").await.unwrap().unwrap();
    assert_eq!(trial.enrichment_status.targets, StageStatus::Completed);
    let targets = trial.target_enrichment.unwrap();
    assert!(!targets.found);
    assert!(targets.targets.is_empty());
}

#[tokio::test]
async fn test_batch_survives_single_record_failure() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT01000006", "faildrug"))
        .await
        .unwrap();
    trials::upsert_seed(&pool, &seed("NCT01000007", "gooddrug"))
        .await
        .unwrap();

    // First lookup fails, second succeeds (records processed in id order)
    let targets = Arc::new(FlakyTargetSource::new(1, Some(lookup_with_uniprot())));
    let connectors = mock_connectors(targets, Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    let stats = orchestrator.run_enrich_sweep().await.unwrap();
    assert_eq!(stats.queued, 1);

    let failed = trials::get_trial(&pool, "NCT01000006").await.unwrap().unwrap();
    let ok = trials::get_trial(&pool, "NCT01000007").await.unwrap().unwrap();
    assert_eq!(failed.enrichment_status.targets, StageStatus::Pending);
    assert_eq!(ok.enrichment_status.targets, StageStatus::Completed);
}
