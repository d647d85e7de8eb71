//! Trial record store
//!
//! Keyed documents with an embedded per-stage status map. Status
//! transitions are read-modify-write on the whole map: the current map is
//! re-read immediately before every write-back so sibling-stage updates
//! are never lost to a stale patch.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use ctpipe_common::{Error, Result};

use crate::models::{
    EnrichmentStatus, SeedRecord, Stage, StageStatus, TrialRecord,
};

/// Seed a trial record (idempotent: an existing record is left untouched)
///
/// Returns `true` when a new record was inserted.
pub async fn upsert_seed(pool: &SqlitePool, seed: &SeedRecord) -> Result<bool> {
    let now = Utc::now();
    let status = serde_json::to_string(&EnrichmentStatus::new(now))
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO trials (
            nct_id, drug_name, title, intervention_type, drug_description,
            phase, overall_status, why_stopped, sponsor, start_date,
            completion_date, enrichment_status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(nct_id) DO NOTHING
        "#,
    )
    .bind(&seed.nct_id)
    .bind(&seed.drug_name)
    .bind(&seed.title)
    .bind(&seed.intervention_type)
    .bind(&seed.drug_description)
    .bind(&seed.phase)
    .bind(&seed.overall_status)
    .bind(&seed.why_stopped)
    .bind(&seed.sponsor)
    .bind(&seed.start_date)
    .bind(&seed.completion_date)
    .bind(&status)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load one trial record
pub async fn get_trial(pool: &SqlitePool, nct_id: &str) -> Result<Option<TrialRecord>> {
    let row = sqlx::query("SELECT * FROM trials WHERE nct_id = ?")
        .bind(nct_id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_trial).transpose()
}

/// Load all records where `stage` is pending and its dependency (if any)
/// is completed:
/// - `ppi` requires `targets` completed
/// - `llm_analysis` requires `failure_details` completed
pub async fn load_stage_pending(pool: &SqlitePool, stage: Stage) -> Result<Vec<TrialRecord>> {
    let sql = match stage {
        Stage::Targets => {
            "SELECT * FROM trials
             WHERE json_extract(enrichment_status, '$.targets') = 'pending'
             ORDER BY nct_id"
        }
        Stage::Ppi => {
            "SELECT * FROM trials
             WHERE json_extract(enrichment_status, '$.ppi') = 'pending'
               AND json_extract(enrichment_status, '$.targets') = 'completed'
             ORDER BY nct_id"
        }
        Stage::FailureDetails => {
            "SELECT * FROM trials
             WHERE json_extract(enrichment_status, '$.failure_details') = 'pending'
             ORDER BY nct_id"
        }
        Stage::LlmAnalysis => {
            "SELECT * FROM trials
             WHERE json_extract(enrichment_status, '$.llm_analysis') = 'pending'
               AND json_extract(enrichment_status, '$.failure_details') = 'completed'
             ORDER BY nct_id"
        }
    };

    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.into_iter().map(row_to_trial).collect()
}

/// Load all records whose `llm_analysis` stage is completed (export input)
pub async fn load_analysis_completed(pool: &SqlitePool) -> Result<Vec<TrialRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM trials
         WHERE json_extract(enrichment_status, '$.llm_analysis') = 'completed'
         ORDER BY nct_id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_trial).collect()
}

/// Mark a stage completed and persist its payload in one write.
///
/// The status map is re-read inside this call so a concurrent update to a
/// sibling stage between the caller's read and this write is preserved.
pub async fn complete_stage(
    pool: &SqlitePool,
    nct_id: &str,
    stage: Stage,
    payload_json: String,
) -> Result<()> {
    write_stage(pool, nct_id, stage, StageStatus::Completed, Some(payload_json)).await
}

/// Permanently mark a stage failed (retry ceiling exhausted)
pub async fn mark_stage_failed(pool: &SqlitePool, nct_id: &str, stage: Stage) -> Result<()> {
    write_stage(pool, nct_id, stage, StageStatus::Failed, None).await
}

/// Reset a stage back to pending (maintenance/testing path)
pub async fn reset_stage(pool: &SqlitePool, nct_id: &str, stage: Stage) -> Result<()> {
    write_stage(pool, nct_id, stage, StageStatus::Pending, None).await
}

async fn write_stage(
    pool: &SqlitePool,
    nct_id: &str,
    stage: Stage,
    status: StageStatus,
    payload_json: Option<String>,
) -> Result<()> {
    let current = load_status(pool, nct_id).await?;
    let merged = current.with_stage(stage, status, Utc::now());
    let merged_json = serde_json::to_string(&merged)
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;

    // Payload column names are fixed per stage
    let payload_column = match stage {
        Stage::Targets => "target_enrichment",
        Stage::Ppi => "ppi_enrichment",
        Stage::FailureDetails => "failure_enrichment",
        Stage::LlmAnalysis => "llm_analysis",
    };

    let result = match payload_json {
        Some(payload) => {
            let sql = format!(
                "UPDATE trials SET enrichment_status = ?, {} = ? WHERE nct_id = ?",
                payload_column
            );
            sqlx::query(&sql)
                .bind(&merged_json)
                .bind(&payload)
                .bind(nct_id)
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("UPDATE trials SET enrichment_status = ? WHERE nct_id = ?")
                .bind(&merged_json)
                .bind(nct_id)
                .execute(pool)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Trial not found: {}", nct_id)));
    }

    Ok(())
}

/// Re-read the current status map for a record
pub async fn load_status(pool: &SqlitePool, nct_id: &str) -> Result<EnrichmentStatus> {
    let row = sqlx::query("SELECT enrichment_status FROM trials WHERE nct_id = ?")
        .bind(nct_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Trial not found: {}", nct_id)))?;

    let status: String = row.get("enrichment_status");
    serde_json::from_str(&status)
        .map_err(|e| Error::Internal(format!("Failed to deserialize status: {}", e)))
}

/// Per-stage status counts for the status report
pub async fn stage_status_counts(
    pool: &SqlitePool,
) -> Result<Vec<(Stage, String, i64)>> {
    let mut counts = Vec::new();

    for stage in Stage::ALL {
        let sql = format!(
            "SELECT json_extract(enrichment_status, '$.{}') AS status, COUNT(*) AS n
             FROM trials GROUP BY status",
            stage.as_str()
        );
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            counts.push((stage, status, n));
        }
    }

    Ok(counts)
}

/// Total record count
pub async fn count_trials(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trials")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_trial(row: sqlx::sqlite::SqliteRow) -> Result<TrialRecord> {
    let status: String = row.get("enrichment_status");
    let enrichment_status: EnrichmentStatus = serde_json::from_str(&status)
        .map_err(|e| Error::Internal(format!("Failed to deserialize status: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(TrialRecord {
        nct_id: row.get("nct_id"),
        drug_name: row.get("drug_name"),
        title: row.get("title"),
        intervention_type: row.get("intervention_type"),
        drug_description: row.get("drug_description"),
        phase: row.get("phase"),
        overall_status: row.get("overall_status"),
        why_stopped: row.get("why_stopped"),
        sponsor: row.get("sponsor"),
        start_date: row.get("start_date"),
        completion_date: row.get("completion_date"),
        enrichment_status,
        target_enrichment: parse_payload(&row, "target_enrichment")?,
        ppi_enrichment: parse_payload(&row, "ppi_enrichment")?,
        failure_enrichment: parse_payload(&row, "failure_enrichment")?,
        llm_analysis: parse_payload(&row, "llm_analysis")?,
        created_at,
    })
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<T>> {
    let raw: Option<String> = row.get(column);
    raw.map(|json| {
        serde_json::from_str(&json)
            .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
    })
    .transpose()
}
