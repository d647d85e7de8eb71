//! Pipeline run persistence

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use ctpipe_common::{Error, Result};

use crate::models::{PipelineRun, RunKind, RunState};

/// Save (insert or update) a pipeline run
pub async fn save_run(pool: &SqlitePool, run: &PipelineRun) -> Result<()> {
    let kind = serde_json::to_string(&run.kind)
        .map_err(|e| Error::Internal(format!("Failed to serialize run kind: {}", e)))?;
    let state = serde_json::to_string(&run.state)
        .map_err(|e| Error::Internal(format!("Failed to serialize run state: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO pipeline_runs (
            run_id, kind, state, processed, succeeded, failed, queued,
            started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            state = excluded.state,
            processed = excluded.processed,
            succeeded = excluded.succeeded,
            failed = excluded.failed,
            queued = excluded.queued,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(&kind)
    .bind(&state)
    .bind(run.processed as i64)
    .bind(run.succeeded as i64)
    .bind(run.failed as i64)
    .bind(run.queued as i64)
    .bind(run.started_at.to_rfc3339())
    .bind(run.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a pipeline run by id
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<PipelineRun>> {
    let row = sqlx::query("SELECT * FROM pipeline_runs WHERE run_id = ?")
        .bind(run_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let kind: String = row.get("kind");
            let kind: RunKind = serde_json::from_str(&kind)
                .map_err(|e| Error::Internal(format!("Failed to deserialize run kind: {}", e)))?;

            let state: String = row.get("state");
            let state: RunState = serde_json::from_str(&state)
                .map_err(|e| Error::Internal(format!("Failed to deserialize run state: {}", e)))?;

            let started_at: String = row.get("started_at");
            let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            let ended_at: Option<String> = row.get("ended_at");
            let ended_at = ended_at
                .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
                .transpose()
                .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
                .map(|dt| dt.with_timezone(&chrono::Utc));

            Ok(Some(PipelineRun {
                run_id,
                kind,
                state,
                processed: row.get::<i64, _>("processed") as u64,
                succeeded: row.get::<i64, _>("succeeded") as u64,
                failed: row.get::<i64, _>("failed") as u64,
                queued: row.get::<i64, _>("queued") as u64,
                started_at,
                ended_at,
            }))
        }
        None => Ok(None),
    }
}

/// Mark stale RUNNING rows as FAILED on startup
///
/// A run not in a terminal state when the process starts belongs to a
/// previous run of the binary and will never progress.
pub async fn cleanup_stale_runs(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE pipeline_runs
        SET state = '"FAILED"',
            ended_at = ?
        WHERE state = '"RUNNING"'
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
