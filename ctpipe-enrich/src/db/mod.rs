//! Database access for the enrichment pipeline
//!
//! Two durable stores live in one SQLite database: the trial record store
//! and the retry queue. Both survive process restarts; every stage
//! executor is idempotent, so any `pending` work found after a restart is
//! safe to re-attempt.

pub mod llm_cache;
pub mod runs;
pub mod trials;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize pipeline tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trials (
            nct_id TEXT PRIMARY KEY,
            drug_name TEXT,
            title TEXT,
            intervention_type TEXT,
            drug_description TEXT,
            phase TEXT,
            overall_status TEXT,
            why_stopped TEXT,
            sponsor TEXT,
            start_date TEXT,
            completion_date TEXT,
            enrichment_status TEXT NOT NULL,
            target_enrichment TEXT,
            ppi_enrichment TEXT,
            failure_enrichment TEXT,
            llm_analysis TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS retry_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nct_id TEXT NOT NULL,
            stage TEXT NOT NULL,
            last_error TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            next_retry_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(nct_id, stage)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS llm_cache (
            nct_id TEXT PRIMARY KEY,
            analysis TEXT NOT NULL,
            cached_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            state TEXT NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            succeeded INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            queued INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (trials, retry_queue, llm_cache, pipeline_runs)");

    Ok(())
}
