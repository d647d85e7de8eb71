//! Durable retry queue with exponential backoff
//!
//! One entry per failed (record, stage) pair. Entries are owned
//! exclusively by this queue: the record store never mutates them. The
//! per-entry state machine is
//! `scheduled → (due) → attempted → {succeeded | failed-again | ceiling}`:
//! success removes the entry, another failure reschedules it, and the
//! fifth failed retry removes it and permanently fails the stage.
//!
//! Sweeps are idempotent — an entry is due only while
//! `next_retry_at <= now`, so re-running a sweep before the next schedule
//! is a no-op.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use ctpipe_common::{Error, Result};

use crate::models::Stage;

/// Maximum retry attempts before a stage is permanently marked failed
pub const RETRY_CEILING: u32 = 5;

/// Backoff base interval
pub const BASE_INTERVAL_MINUTES: i64 = 5;

/// Compute the next retry time: `now + base_interval * 2^retry_count`
pub fn next_retry_at(now: DateTime<Utc>, retry_count: u32) -> DateTime<Utc> {
    let backoff_minutes = BASE_INTERVAL_MINUTES * 2i64.pow(retry_count.min(16));
    now + Duration::minutes(backoff_minutes)
}

/// One queued retry
#[derive(Debug, Clone)]
pub struct RetryEntry {
    pub id: i64,
    pub nct_id: String,
    pub stage: Stage,
    pub last_error: String,
    pub retry_count: u32,
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Durable retry queue over the pipeline database
#[derive(Clone)]
pub struct RetryQueue {
    pool: SqlitePool,
}

impl RetryQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a failed (record, stage) pair.
    ///
    /// A pair already awaiting retry keeps its existing schedule; the
    /// record's own stage status is left untouched by this call (a pending
    /// stage stays pending across retries).
    pub async fn enqueue(
        &self,
        nct_id: &str,
        stage: Stage,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO retry_queue (nct_id, stage, last_error, retry_count, next_retry_at, created_at)
            VALUES (?, ?, ?, 0, ?, ?)
            ON CONFLICT(nct_id, stage) DO NOTHING
            "#,
        )
        .bind(nct_id)
        .bind(stage.as_str())
        .bind(error)
        .bind(next_retry_at(now, 0).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::warn!(
                nct_id = %nct_id,
                stage = %stage,
                error = %error,
                "Stage failed, queued for retry"
            );
        }
        Ok(inserted)
    }

    /// All entries whose `next_retry_at` has passed
    pub async fn due_entries(&self, now: DateTime<Utc>) -> Result<Vec<RetryEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM retry_queue WHERE next_retry_at <= ? ORDER BY next_retry_at",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_entry).collect()
    }

    /// Reschedule after another failed attempt
    pub async fn reschedule(
        &self,
        id: i64,
        retry_count: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE retry_queue SET retry_count = ?, last_error = ?, next_retry_at = ? WHERE id = ?",
        )
        .bind(retry_count as i64)
        .bind(error)
        .bind(next_retry_at(now, retry_count).to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove an entry (stage succeeded, or ceiling reached)
    pub async fn remove(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM retry_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Entry for one (record, stage) pair, if queued
    pub async fn entry_for(&self, nct_id: &str, stage: Stage) -> Result<Option<RetryEntry>> {
        let row = sqlx::query("SELECT * FROM retry_queue WHERE nct_id = ? AND stage = ?")
            .bind(nct_id)
            .bind(stage.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_entry).transpose()
    }

    /// Number of queued entries
    pub async fn len(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM retry_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> Result<RetryEntry> {
    let stage: String = row.get("stage");
    let stage = Stage::parse(&stage)
        .ok_or_else(|| Error::Internal(format!("Unknown stage in retry queue: {}", stage)))?;

    let next: String = row.get("next_retry_at");
    let next_retry_at = ctpipe_common::time::parse_timestamp(&next)?;

    let created: String = row.get("created_at");
    let created_at = ctpipe_common::time::parse_timestamp(&created)?;

    Ok(RetryEntry {
        id: row.get("id"),
        nct_id: row.get("nct_id"),
        stage,
        last_error: row.get("last_error"),
        retry_count: row.get::<i64, _>("retry_count") as u32,
        next_retry_at,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_monotonic() {
        let now = Utc::now();
        for n in 0..RETRY_CEILING {
            assert!(next_retry_at(now, n) < next_retry_at(now, n + 1));
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let now = Utc::now();
        assert_eq!(next_retry_at(now, 0), now + Duration::minutes(5));
        assert_eq!(next_retry_at(now, 1), now + Duration::minutes(10));
        assert_eq!(next_retry_at(now, 4), now + Duration::minutes(80));
    }

    #[test]
    fn test_backoff_exponent_capped() {
        // Pathological retry counts must not overflow the interval math
        let now = Utc::now();
        let far = next_retry_at(now, u32::MAX);
        assert!(far > now);
    }
}
