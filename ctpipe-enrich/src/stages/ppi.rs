//! Interaction-network enrichment stage
//!
//! Runs only after target enrichment completed. Records whose targets
//! carry zero protein cross-references complete immediately with an empty
//! payload; for the rest, the interaction connector is queried per
//! identifier and summary statistics are computed over the accumulated
//! edge list.

use crate::connectors::{ConnectorError, ConnectorSet};
use crate::models::{NetworkFeatures, PpiEnrichment, TrialRecord};

/// Run the interaction-network enrichment stage for one record
pub async fn enrich_ppi(
    trial: &TrialRecord,
    connectors: &ConnectorSet,
) -> Result<PpiEnrichment, ConnectorError> {
    let uniprot_ids = trial.uniprot_ids();

    if uniprot_ids.is_empty() {
        // Not a failure: nothing to query for this record
        tracing::debug!(nct_id = %trial.nct_id, "No protein cross-references, empty network");
        return Ok(PpiEnrichment::empty());
    }

    let mut interactions = Vec::new();
    for uniprot_id in &uniprot_ids {
        // A connector error here fails the whole stage (retried later)
        let edges = connectors.interactions.interactions(uniprot_id).await?;
        interactions.extend(edges);
    }

    let network_features = NetworkFeatures::from_interactions(&interactions);

    tracing::info!(
        nct_id = %trial.nct_id,
        proteins = uniprot_ids.len(),
        edges = interactions.len(),
        avg_degree = network_features.avg_degree,
        "Interaction network assembled"
    );

    Ok(PpiEnrichment {
        uniprot_count: uniprot_ids.len(),
        interactions,
        network_features,
    })
}
