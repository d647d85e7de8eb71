//! UniProt REST client
//!
//! Secondary target source: a lightweight drug-to-protein mapping used as
//! fallback when the primary bioactivity source yields no protein
//! cross-references. Targets carry no potency data.

use serde::Deserialize;
use std::time::Duration;

use super::{ConnectorError, RateLimiter, TargetLookup, TargetSource};
use crate::models::DrugTarget;

const UNIPROT_BASE_URL: &str = "https://rest.uniprot.org/uniprotkb";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
const RATE_LIMIT_MS: u64 = 100;
/// Keep only the top results of the free-text search
const MAX_FALLBACK_TARGETS: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<UniProtEntry>,
}

#[derive(Debug, Deserialize)]
struct UniProtEntry {
    #[serde(rename = "primaryAccession")]
    primary_accession: Option<String>,
}

/// UniProt search client
pub struct UniProtClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl UniProtClient {
    pub fn new() -> Result<Self, ConnectorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }
}

#[async_trait::async_trait]
impl TargetSource for UniProtClient {
    fn name(&self) -> &'static str {
        "uniprot_fallback"
    }

    async fn lookup_targets(
        &self,
        drug_name: &str,
    ) -> Result<Option<TargetLookup>, ConnectorError> {
        self.rate_limiter.wait().await;

        let query = format!("({}) AND (reviewed:true)", drug_name);
        let response = self
            .http_client
            .get(format!("{}/search", UNIPROT_BASE_URL))
            .query(&[
                ("query", query.as_str()),
                ("fields", "accession,protein_name"),
                ("format", "json"),
                ("size", "10"),
            ])
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(status.as_u16(), error_text));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let targets: Vec<DrugTarget> = parsed
            .results
            .into_iter()
            .take(MAX_FALLBACK_TARGETS)
            .filter_map(|entry| entry.primary_accession)
            .map(|accession| DrugTarget {
                chembl_id: None,
                uniprot_id: Some(accession),
                ic50_values: Vec::new(),
                source: Some("uniprot_fallback".to_string()),
            })
            .collect();

        if targets.is_empty() {
            tracing::debug!(drug = %drug_name, "No UniProt fallback match");
            return Ok(None);
        }

        tracing::info!(
            drug = %drug_name,
            targets = targets.len(),
            "UniProt fallback supplied targets"
        );

        Ok(Some(TargetLookup {
            source_id: None,
            pref_name: None,
            targets,
        }))
    }
}
