//! LLM analysis response cache
//!
//! Keyed by trial identifier. Write-once: the first successful
//! classification is authoritative and is never recomputed unless the
//! cache is cleared externally. Only complete, verified results are ever
//! written — a failed classification attempt leaves no partial entry.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use ctpipe_common::{Error, Result};

use crate::models::LlmAnalysis;

/// Look up a cached analysis for a trial
pub async fn get(pool: &SqlitePool, nct_id: &str) -> Result<Option<LlmAnalysis>> {
    let row = sqlx::query("SELECT analysis FROM llm_cache WHERE nct_id = ?")
        .bind(nct_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        let json: String = row.get("analysis");
        serde_json::from_str(&json)
            .map_err(|e| Error::Internal(format!("Failed to deserialize cached analysis: {}", e)))
    })
    .transpose()
}

/// Store a finalized analysis (first write wins)
pub async fn put(pool: &SqlitePool, nct_id: &str, analysis: &LlmAnalysis) -> Result<()> {
    let json = serde_json::to_string(analysis)
        .map_err(|e| Error::Internal(format!("Failed to serialize analysis: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO llm_cache (nct_id, analysis, cached_at)
        VALUES (?, ?, ?)
        ON CONFLICT(nct_id) DO NOTHING
        "#,
    )
    .bind(nct_id)
    .bind(&json)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of cached analyses
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM llm_cache")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
