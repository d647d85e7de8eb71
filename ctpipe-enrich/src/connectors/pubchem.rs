//! PubChem compound client
//!
//! Drug-name normalization via CID lookup and IUPAC name retrieval.
//! Used best-effort ahead of the primary target search.

use serde::Deserialize;
use std::time::Duration;

use super::{CompoundNormalizer, ConnectorError, RateLimiter};

const PUBCHEM_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
const RATE_LIMIT_MS: u64 = 100;

#[derive(Debug, Deserialize)]
struct CidResponse {
    #[serde(rename = "IdentifierList")]
    identifier_list: Option<IdentifierList>,
}

#[derive(Debug, Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID", default)]
    cids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: Option<PropertyTable>,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<CompoundProperties>,
}

#[derive(Debug, Deserialize)]
struct CompoundProperties {
    #[serde(rename = "IUPACName")]
    iupac_name: Option<String>,
}

/// PubChem PUG REST client
pub struct PubChemClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl PubChemClient {
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

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, ConnectorError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();

        // PubChem reports "no such compound" as 404
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
}

#[async_trait::async_trait]
impl CompoundNormalizer for PubChemClient {
    async fn normalize(&self, drug_name: &str) -> Result<Option<String>, ConnectorError> {
        let encoded = urlencode(drug_name);
        let cid_url = format!("{}/compound/name/{}/cids/JSON", PUBCHEM_BASE_URL, encoded);

        let response: Option<CidResponse> = self.get_json(&cid_url).await?;
        let Some(cid) = response
            .and_then(|r| r.identifier_list)
            .and_then(|l| l.cids.into_iter().next())
        else {
            return Ok(None);
        };

        let props_url = format!(
            "{}/compound/cid/{}/property/IUPACName/JSON",
            PUBCHEM_BASE_URL, cid
        );
        let response: Option<PropertyResponse> = self.get_json(&props_url).await?;

        let name = response
            .and_then(|r| r.property_table)
            .and_then(|t| t.properties.into_iter().next())
            .and_then(|p| p.iupac_name);

        if let Some(name) = &name {
            tracing::debug!(drug = %drug_name, normalized = %name, "Drug name normalized");
        }

        Ok(name)
    }
}

/// Percent-encode a drug name for use in a path segment
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
