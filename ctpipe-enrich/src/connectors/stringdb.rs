//! STRING protein-interaction network client

use serde::Deserialize;
use std::time::Duration;

use super::{ConnectorError, InteractionSource, RateLimiter};
use crate::models::PpiInteraction;

const STRING_BASE_URL: &str = "https://string-db.org/api/json";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
const RATE_LIMIT_MS: u64 = 100;
/// Human taxon
const SPECIES: &str = "9606";
/// Minimum combined score (STRING scale, 0-1000)
const REQUIRED_SCORE: &str = "700";

#[derive(Debug, Deserialize)]
struct StringEdge {
    #[serde(rename = "preferredName_A")]
    preferred_name_a: Option<String>,
    #[serde(rename = "preferredName_B")]
    preferred_name_b: Option<String>,
    score: Option<f64>,
}

/// STRING API client
pub struct StringDbClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl StringDbClient {
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
impl InteractionSource for StringDbClient {
    async fn interactions(
        &self,
        protein_id: &str,
    ) -> Result<Vec<PpiInteraction>, ConnectorError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(format!("{}/network", STRING_BASE_URL))
            .query(&[
                ("identifiers", protein_id),
                ("species", SPECIES),
                ("required_score", REQUIRED_SCORE),
            ])
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();

        // STRING answers 400 for identifiers it cannot map; treat as no data
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(status.as_u16(), error_text));
        }

        let edges: Vec<StringEdge> = response
            .json()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let interactions: Vec<PpiInteraction> = edges
            .into_iter()
            .filter_map(|edge| {
                let protein_a = edge.preferred_name_a?;
                let protein_b = edge.preferred_name_b?;
                Some(PpiInteraction {
                    protein_a,
                    protein_b,
                    combined_score: edge.score,
                    interaction_type: "physical".to_string(),
                })
            })
            .collect();

        tracing::debug!(
            protein = %protein_id,
            edges = interactions.len(),
            "STRING network fetched"
        );

        Ok(interactions)
    }
}
