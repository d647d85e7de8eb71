//! PubMed E-utilities client
//!
//! Literature search: esearch for PMIDs, esummary for titles and authors.

use serde::Deserialize;
use std::time::Duration;

use super::{ConnectorError, LiteratureSource, RateLimiter};
use crate::models::PubmedRef;

const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
/// NCBI asks for at most ~3 requests/second without an API key
const RATE_LIMIT_MS: u64 = 350;
const MAX_RESULTS: &str = "5";
/// Keep only the leading authors in the stored payload
const MAX_AUTHORS: usize = 3;

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: Option<ESearchResult>,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ESummaryResponse {
    result: Option<serde_json::Map<String, serde_json::Value>>,
}

/// PubMed E-utilities client
pub struct PubMedClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl PubMedClient {
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
        query: &[(&str, &str)],
    ) -> Result<T, ConnectorError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(status.as_u16(), error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))
    }

    /// Extract title and leading authors from one esummary document
    fn parse_summary(pmid: &str, doc: &serde_json::Value) -> PubmedRef {
        let title = doc
            .get("title")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let authors = doc
            .get("authors")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .take(MAX_AUTHORS)
                    .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        PubmedRef {
            pmid: pmid.to_string(),
            title,
            authors,
        }
    }
}

#[async_trait::async_trait]
impl LiteratureSource for PubMedClient {
    async fn search(
        &self,
        nct_id: &str,
        drug_name: &str,
    ) -> Result<Vec<PubmedRef>, ConnectorError> {
        let term = format!("{} OR ({} AND clinical trial)", nct_id, drug_name);

        let search: ESearchResponse = self
            .get_json(
                &format!("{}/esearch.fcgi", EUTILS_BASE_URL),
                &[
                    ("db", "pubmed"),
                    ("term", term.as_str()),
                    ("retmode", "json"),
                    ("retmax", MAX_RESULTS),
                ],
            )
            .await?;

        let pmids = search
            .esearchresult
            .map(|r| r.idlist)
            .unwrap_or_default();

        if pmids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = pmids.join(",");
        let summary: ESummaryResponse = self
            .get_json(
                &format!("{}/esummary.fcgi", EUTILS_BASE_URL),
                &[("db", "pubmed"), ("id", ids.as_str()), ("retmode", "json")],
            )
            .await?;

        let Some(result) = summary.result else {
            return Ok(Vec::new());
        };

        let refs: Vec<PubmedRef> = pmids
            .iter()
            .filter_map(|pmid| result.get(pmid).map(|doc| Self::parse_summary(pmid, doc)))
            .collect();

        tracing::debug!(
            nct_id = %nct_id,
            publications = refs.len(),
            "PubMed search complete"
        );

        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(PubMedClient::new().is_ok());
    }

    #[test]
    fn test_parse_summary_limits_authors() {
        let doc = serde_json::json!({
            "title": "A terminated phase 1 study",
            "authors": [
                {"name": "Smith J"},
                {"name": "Jones K"},
                {"name": "Lee A"},
                {"name": "Park B"}
            ]
        });
        let parsed = PubMedClient::parse_summary("12345", &doc);
        assert_eq!(parsed.pmid, "12345");
        assert_eq!(parsed.authors.len(), 3);
        assert_eq!(parsed.title.as_deref(), Some("A terminated phase 1 study"));
    }

    #[test]
    fn test_esearch_parse() {
        let json = r#"{"esearchresult": {"idlist": ["111", "222"]}}"#;
        let parsed: ESearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.esearchresult.unwrap().idlist.len(), 2);
    }
}
