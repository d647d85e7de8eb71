//! Record ingestion
//!
//! Seeds the record store from the upstream registry query or a JSON seed
//! file. Seeding is idempotent: an existing record's descriptive fields
//! and stage statuses are left untouched, so re-running ingestion never
//! resets enrichment progress.

use sqlx::SqlitePool;
use std::path::Path;
use ctpipe_common::{Error, Result};

use crate::connectors::AactClient;
use crate::db::trials;
use crate::models::SeedRecord;

/// Ingestion counters
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Seed records from a JSON file (an array of seed records)
pub async fn seed_from_file(pool: &SqlitePool, path: &Path) -> Result<IngestStats> {
    let content = std::fs::read_to_string(path)?;
    let seeds: Vec<SeedRecord> = serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("Failed to parse seed file: {}", e)))?;

    insert_seeds(pool, seeds).await
}

/// Seed records from the upstream registry database
pub async fn seed_from_registry(
    pool: &SqlitePool,
    registry: &AactClient,
    start_year: i32,
    limit: Option<i64>,
) -> Result<IngestStats> {
    let seeds = registry
        .fetch_seed_records(start_year, limit)
        .await
        .map_err(|e| Error::Internal(format!("Registry seed query failed: {}", e)))?;

    insert_seeds(pool, seeds).await
}

async fn insert_seeds(pool: &SqlitePool, seeds: Vec<SeedRecord>) -> Result<IngestStats> {
    let mut stats = IngestStats {
        total: seeds.len(),
        ..Default::default()
    };

    for seed in &seeds {
        if seed.nct_id.trim().is_empty() {
            tracing::warn!("Seed record without identifier skipped");
            stats.skipped += 1;
            continue;
        }

        if trials::upsert_seed(pool, seed).await? {
            stats.inserted += 1;
        } else {
            stats.skipped += 1;
        }
    }

    tracing::info!(
        total = stats.total,
        inserted = stats.inserted,
        skipped = stats.skipped,
        "Ingestion finished"
    );

    Ok(stats)
}
