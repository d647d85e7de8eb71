//! ChEMBL API client
//!
//! Primary target/activity source: molecule search, IC50 activity
//! aggregation, and UniProt cross-references per target.

use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use super::{ConnectorError, TargetLookup, TargetSource};
use crate::models::{DrugTarget, Ic50Measurement};

const CHEMBL_BASE_URL: &str = "https://www.ebi.ac.uk/chembl/api/data";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
/// ChEMBL tolerates a high request rate; keep a 50ms floor between calls
const RATE_LIMIT_MS: u64 = 50;
/// Activity page size per molecule
const ACTIVITY_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct MoleculeSearchResponse {
    #[serde(default)]
    molecules: Vec<Molecule>,
}

#[derive(Debug, Deserialize)]
struct Molecule {
    molecule_chembl_id: String,
    pref_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    #[serde(default)]
    activities: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    target_chembl_id: Option<String>,
    /// String or number depending on the record
    standard_value: Option<serde_json::Value>,
    standard_units: Option<String>,
}

impl Activity {
    fn value_as_f64(&self) -> Option<f64> {
        match &self.standard_value {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.parse::<f64>().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TargetResponse {
    #[serde(default)]
    target_components: Vec<TargetComponent>,
}

#[derive(Debug, Deserialize)]
struct TargetComponent {
    #[serde(default)]
    target_component_xrefs: Vec<ComponentXref>,
}

#[derive(Debug, Deserialize)]
struct ComponentXref {
    xref_src_db: Option<String>,
    xref_id: Option<String>,
}

/// ChEMBL API client
pub struct ChemblClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl ChemblClient {
    pub fn new() -> Result<Self, ConnectorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        let quota = Quota::with_period(Duration::from_millis(RATE_LIMIT_MS))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(20).expect("20 is non-zero")));

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ConnectorError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        Ok(Some(parsed))
    }

    /// Search for a molecule by name
    async fn search_molecule(&self, name: &str) -> Result<Option<Molecule>, ConnectorError> {
        let url = format!("{}/molecule/search", CHEMBL_BASE_URL);
        let response: Option<MoleculeSearchResponse> = self
            .get_json(&url, &[("q", name.to_string()), ("format", "json".to_string())])
            .await?;

        Ok(response.and_then(|r| r.molecules.into_iter().next()))
    }

    /// IC50 activities for a molecule, aggregated per target
    async fn get_targets(&self, molecule_id: &str) -> Result<Vec<DrugTarget>, ConnectorError> {
        let url = format!("{}/activity", CHEMBL_BASE_URL);
        let response: Option<ActivityResponse> = self
            .get_json(
                &url,
                &[
                    ("molecule_chembl_id", molecule_id.to_string()),
                    ("standard_type", "IC50".to_string()),
                    ("format", "json".to_string()),
                    ("limit", ACTIVITY_LIMIT.to_string()),
                ],
            )
            .await?;

        let activities = response.map(|r| r.activities).unwrap_or_default();

        // Aggregate activities by target, preserving first-seen order
        let mut order: Vec<String> = Vec::new();
        let mut measurements: HashMap<String, Vec<Ic50Measurement>> = HashMap::new();
        for activity in activities {
            let value = activity.value_as_f64();
            let Some(target_id) = activity.target_chembl_id else {
                continue;
            };
            if !measurements.contains_key(&target_id) {
                order.push(target_id.clone());
            }
            let entry = measurements.entry(target_id).or_default();

            if let (Some(value), Some(units)) = (value, activity.standard_units) {
                entry.push(Ic50Measurement { value, units });
            }
        }

        let mut targets = Vec::with_capacity(order.len());
        for target_id in order {
            let uniprot_id = self.get_uniprot_xref(&target_id).await?;
            let ic50_values = measurements.remove(&target_id).unwrap_or_default();
            targets.push(DrugTarget {
                chembl_id: Some(target_id),
                uniprot_id,
                ic50_values,
                source: None,
            });
        }

        Ok(targets)
    }

    /// UniProt accession cross-referenced by a ChEMBL target
    async fn get_uniprot_xref(&self, target_id: &str) -> Result<Option<String>, ConnectorError> {
        let url = format!("{}/target/{}", CHEMBL_BASE_URL, target_id);
        let response: Option<TargetResponse> = self
            .get_json(&url, &[("format", "json".to_string())])
            .await?;

        let Some(response) = response else {
            return Ok(None);
        };

        for component in response.target_components {
            for xref in component.target_component_xrefs {
                if xref.xref_src_db.as_deref() == Some("UniProt") {
                    if let Some(id) = xref.xref_id {
                        return Ok(Some(id));
                    }
                }
            }
        }

        Ok(None)
    }
}

#[async_trait::async_trait]
impl TargetSource for ChemblClient {
    fn name(&self) -> &'static str {
        "chembl"
    }

    async fn lookup_targets(
        &self,
        drug_name: &str,
    ) -> Result<Option<TargetLookup>, ConnectorError> {
        let Some(molecule) = self.search_molecule(drug_name).await? else {
            tracing::debug!(drug = %drug_name, "No ChEMBL molecule match");
            return Ok(None);
        };

        let targets = self.get_targets(&molecule.molecule_chembl_id).await?;

        tracing::info!(
            drug = %drug_name,
            chembl_id = %molecule.molecule_chembl_id,
            targets = targets.len(),
            "ChEMBL target lookup complete"
        );

        Ok(Some(TargetLookup {
            source_id: Some(molecule.molecule_chembl_id),
            pref_name: molecule.pref_name,
            targets,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChemblClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_activity_response_tolerates_missing_fields() {
        let json = r#"{"activities": [{"target_chembl_id": "CHEMBL204"}]}"#;
        let parsed: ActivityResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.activities.len(), 1);
        assert!(parsed.activities[0].standard_value.is_none());
    }

    #[test]
    fn test_empty_search_response() {
        let parsed: MoleculeSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.molecules.is_empty());
    }
}
