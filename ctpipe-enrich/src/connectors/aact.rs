//! AACT registry database client
//!
//! The upstream AACT Postgres database supplies the seed record set plus
//! detailed descriptions and document pointers during failure-detail
//! enrichment. Treated strictly as an external collaborator.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

use super::{ConnectorError, TrialRegistry};
use crate::models::{RegistryDocument, SeedRecord};

/// Terminal study states eligible for the pipeline
const TERMINAL_STATUSES: [&str; 3] = ["TERMINATED", "SUSPENDED", "WITHDRAWN"];

/// AACT database client
pub struct AactClient {
    pool: PgPool,
}

impl AactClient {
    /// Connect to the AACT database
    pub async fn connect(database_url: &str) -> Result<Self, ConnectorError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Query terminated drug/biological trials as seed records
    ///
    /// Returns one row per (study, intervention) pair, newest first.
    pub async fn fetch_seed_records(
        &self,
        start_year: i32,
        limit: Option<i64>,
    ) -> Result<Vec<SeedRecord>, ConnectorError> {
        let start_date = format!("{}-01-01", start_year);

        let mut sql = String::from(
            r#"
            SELECT DISTINCT
                s.nct_id,
                s.brief_title AS title,
                s.phase,
                s.overall_status,
                s.why_stopped,
                s.start_date::text AS start_date,
                s.completion_date::text AS completion_date,
                i.name AS drug_name,
                i.intervention_type,
                i.description AS drug_description,
                sp.name AS sponsor
            FROM ctgov.studies s
            JOIN ctgov.interventions i ON s.nct_id = i.nct_id
            LEFT JOIN ctgov.sponsors sp ON s.nct_id = sp.nct_id
                AND sp.lead_or_collaborator = 'lead'
            WHERE s.phase IN ('PHASE1', 'PHASE2', 'PHASE3')
              AND s.overall_status = ANY($1)
              AND s.start_date >= $2::date
              AND i.intervention_type IN ('DRUG', 'BIOLOGICAL')
            ORDER BY s.start_date DESC
            "#,
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let statuses: Vec<String> = TERMINAL_STATUSES.iter().map(|s| s.to_string()).collect();

        let rows = sqlx::query(&sql)
            .bind(&statuses)
            .bind(&start_date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        let seeds = rows
            .into_iter()
            .map(|row| SeedRecord {
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
            })
            .collect();

        Ok(seeds)
    }
}

#[async_trait::async_trait]
impl TrialRegistry for AactClient {
    async fn detailed_description(
        &self,
        nct_id: &str,
    ) -> Result<Option<String>, ConnectorError> {
        let row = sqlx::query(
            "SELECT description FROM ctgov.detailed_descriptions WHERE nct_id = $1",
        )
        .bind(nct_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(row.and_then(|r| r.get("description")))
    }

    async fn documents(&self, nct_id: &str) -> Result<Vec<RegistryDocument>, ConnectorError> {
        let rows = sqlx::query("SELECT document_type, url FROM ctgov.documents WHERE nct_id = $1")
            .bind(nct_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| RegistryDocument {
                doc_type: row.get("document_type"),
                url: row.get("url"),
            })
            .collect())
    }
}
