//! Failure-detail enrichment stage
//!
//! Fan-out to the independent detail sources: registry description,
//! registry documents, literature search, public registry study record
//! (adverse events + dosing), and sponsor search-URL generation. A source
//! with no data leaves its field empty; a connector error fails the whole
//! stage (partial results are recomputed on retry).

use futures::future::try_join;

use crate::connectors::{ConnectorError, ConnectorSet};
use crate::models::{FailureEnrichment, TrialRecord};

/// Run the failure-detail enrichment stage for one record
pub async fn enrich_failure_details(
    trial: &TrialRecord,
    connectors: &ConnectorSet,
) -> Result<FailureEnrichment, ConnectorError> {
    let nct_id = trial.nct_id.as_str();
    let drug_name = trial.drug_name.as_deref().unwrap_or_default();

    // Source 1 + 2: upstream registry description and documents (optional
    // collaborator; absent registry leaves the fields empty)
    let (registry_description, registry_documents) = match &connectors.trial_registry {
        Some(registry) => (
            registry.detailed_description(nct_id).await?,
            registry.documents(nct_id).await?,
        ),
        None => (None, Vec::new()),
    };

    // Sources 3 + 4 hit unrelated services and run concurrently
    let (pubmed_results, ctgov) = try_join(
        connectors.literature.search(nct_id, drug_name),
        connectors.study_registry.fetch_study(nct_id),
    )
    .await?;

    // Source 5: sponsor disclosure search links (no network call)
    let company_search_urls = generate_company_search_urls(
        trial.sponsor.as_deref(),
        nct_id,
        drug_name,
    );

    tracing::info!(
        nct_id = %nct_id,
        publications = pubmed_results.len(),
        documents = registry_documents.len(),
        has_registry_record = ctgov.is_some(),
        "Failure details assembled"
    );

    Ok(FailureEnrichment {
        registry_description,
        registry_documents,
        pubmed_results,
        ctgov,
        company_search_urls,
    })
}

/// Web search URLs pointing at sponsor disclosures for this trial
fn generate_company_search_urls(
    sponsor: Option<&str>,
    nct_id: &str,
    drug_name: &str,
) -> Vec<String> {
    let Some(sponsor) = sponsor.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };

    vec![
        format!(
            "https://www.google.com/search?q={}+{}+terminated",
            sponsor.replace(' ', "+"),
            nct_id
        ),
        format!(
            "https://www.google.com/search?q={}+{}+clinical+trial+terminated",
            sponsor.replace(' ', "+"),
            drug_name.replace(' ', "+")
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_urls_without_sponsor() {
        assert!(generate_company_search_urls(None, "NCT01234567", "examplinib").is_empty());
        assert!(generate_company_search_urls(Some("  "), "NCT01234567", "examplinib").is_empty());
    }

    #[test]
    fn test_search_urls_encode_spaces() {
        let urls =
            generate_company_search_urls(Some("Acme Pharma"), "NCT01234567", "examplinib HCl");
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("Acme+Pharma+NCT01234567"));
        assert!(urls[1].contains("examplinib+HCl"));
    }
}
