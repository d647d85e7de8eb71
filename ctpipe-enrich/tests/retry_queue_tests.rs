//! Retry queue tests: backoff scheduling, sweep idempotence, ceiling
//! exhaustion, and success-path entry removal.

mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use ctpipe_enrich::db::trials;
use ctpipe_enrich::models::{Stage, StageStatus};
use ctpipe_enrich::orchestrator::EnrichmentOrchestrator;
use ctpipe_enrich::queue::{next_retry_at, RetryQueue, RETRY_CEILING};

use helpers::*;

#[tokio::test]
async fn test_entry_scheduled_with_base_backoff() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT02000001", "examplinib"))
        .await
        .unwrap();

    let queue = RetryQueue::new(pool.clone());
    let now = Utc::now();
    let inserted = queue
        .enqueue("NCT02000001", Stage::Targets, "Network error: boom", now)
        .await
        .unwrap();
    assert!(inserted);

    let entry = queue
        .entry_for("NCT02000001", Stage::Targets)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.retry_count, 0);
    assert_eq!(entry.next_retry_at, next_retry_at(now, 0));

    // Second enqueue for the same pair keeps the existing schedule
    let inserted = queue
        .enqueue("NCT02000001", Stage::Targets, "another error", now)
        .await
        .unwrap();
    assert!(!inserted);

    // Not due before its schedule
    assert!(queue.due_entries(now).await.unwrap().is_empty());
    assert_eq!(
        queue
            .due_entries(now + Duration::minutes(6))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_successful_retry_removes_entry_and_completes_stage() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT02000002", "examplinib"))
        .await
        .unwrap();

    // Fail once (forward sweep), succeed on the retry
    let targets = Arc::new(FlakyTargetSource::new(1, Some(lookup_with_uniprot())));
    let connectors = mock_connectors(targets.clone(), Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();
    assert_eq!(orchestrator.queue().len().await.unwrap(), 1);

    let later = Utc::now() + Duration::minutes(6);
    let stats = orchestrator.run_retry_sweep(later).await.unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.succeeded, 1);

    let trial = trials::get_trial(&pool, "NCT02000002").await.unwrap().unwrap();
    assert_eq!(trial.enrichment_status.targets, StageStatus::Completed);
    assert!(orchestrator.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_retry_sweep_is_idempotent_before_next_schedule() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT02000003", "examplinib"))
        .await
        .unwrap();

    let targets = Arc::new(FlakyTargetSource::new(u32::MAX, None));
    let connectors = mock_connectors(targets.clone(), Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();
    let calls_after_forward = targets.calls.load(std::sync::atomic::Ordering::SeqCst);

    // First retry sweep: due, attempts, reschedules further out
    let sweep_time = Utc::now() + Duration::minutes(6);
    let stats = orchestrator.run_retry_sweep(sweep_time).await.unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.rescheduled, 1);

    // Same sweep time again: entry no longer due, nothing happens
    let stats = orchestrator.run_retry_sweep(sweep_time).await.unwrap();
    assert_eq!(stats.processed, 0);
    assert_eq!(
        targets.calls.load(std::sync::atomic::Ordering::SeqCst),
        calls_after_forward + 1
    );
}

#[tokio::test]
async fn test_pending_stays_pending_until_ceiling() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT02000004", "examplinib"))
        .await
        .unwrap();

    let targets = Arc::new(FlakyTargetSource::new(u32::MAX, None));
    let connectors = mock_connectors(targets, Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();
    let mut sweep_time = Utc::now();
    // Four retries leave the entry alive and the stage pending
    for _ in 0..(RETRY_CEILING - 1) {
        sweep_time = sweep_time + Duration::days(1);
        orchestrator.run_retry_sweep(sweep_time).await.unwrap();
        let trial = trials::get_trial(&pool, "NCT02000004").await.unwrap().unwrap();
        assert_eq!(trial.enrichment_status.targets, StageStatus::Pending);
    }

    let entry = orchestrator
        .queue()
        .entry_for("NCT02000004", Stage::Targets)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.retry_count, RETRY_CEILING - 1);
}

#[tokio::test]
async fn test_six_consecutive_timeouts_exhaust_ceiling() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT02000005", "examplinib"))
        .await
        .unwrap();

    let targets = Arc::new(FlakyTargetSource::new(u32::MAX, None));
    let connectors = mock_connectors(targets.clone(), Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    // Initial failure plus five failed retries
    orchestrator.run_enrich_sweep().await.unwrap();
    let mut sweep_time = Utc::now();
    for _ in 0..RETRY_CEILING {
        sweep_time = sweep_time + Duration::days(1);
        orchestrator.run_retry_sweep(sweep_time).await.unwrap();
    }

    assert_eq!(
        targets.calls.load(std::sync::atomic::Ordering::SeqCst),
        6,
        "one forward attempt plus five retries"
    );

    // Entry removed, stage permanently failed
    assert!(orchestrator.queue().is_empty().await.unwrap());
    let trial = trials::get_trial(&pool, "NCT02000005").await.unwrap().unwrap();
    assert_eq!(trial.enrichment_status.targets, StageStatus::Failed);

    // Permanently failed records never reach the export input set
    let exportable = trials::load_analysis_completed(&pool).await.unwrap();
    assert!(exportable.is_empty());

    // Later sweeps are no-ops
    let stats = orchestrator
        .run_retry_sweep(sweep_time + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(stats.processed, 0);
}

#[tokio::test]
async fn test_forward_sweep_skips_records_awaiting_retry() {
    let (pool, _dir) = scratch_pool().await;
    trials::upsert_seed(&pool, &seed("NCT02000006", "examplinib"))
        .await
        .unwrap();

    let targets = Arc::new(FlakyTargetSource::new(u32::MAX, None));
    let connectors = mock_connectors(targets.clone(), Arc::new(StaticInteractions::triangle()));
    let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, None);

    orchestrator.run_enrich_sweep().await.unwrap();
    let calls = targets.calls.load(std::sync::atomic::Ordering::SeqCst);

    // The record is still pending but owned by the retry queue now; the
    // forward sweep must not double-attempt it
    orchestrator.run_enrich_sweep().await.unwrap();
    assert_eq!(targets.calls.load(std::sync::atomic::Ordering::SeqCst), calls);

    let entry = orchestrator
        .queue()
        .entry_for("NCT02000006", Stage::Targets)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.retry_count, 0, "forward sweep must not touch the entry");
}
