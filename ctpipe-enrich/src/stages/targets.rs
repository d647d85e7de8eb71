//! Target enrichment stage
//!
//! Primary target/activity lookup with a protein-registry fallback. The
//! stage completes whenever the primary connector call itself succeeded —
//! "no targets found" is a completed stage with an empty target set, not a
//! failure. Only a connector error (network/timeout/unexpected response)
//! fails the stage.

use crate::connectors::{ConnectorError, ConnectorSet};
use crate::models::{TargetEnrichment, TrialRecord};

/// Run the target enrichment stage for one record
pub async fn enrich_targets(
    trial: &TrialRecord,
    connectors: &ConnectorSet,
) -> Result<TargetEnrichment, ConnectorError> {
    let drug_name = trial.drug_name.as_deref().unwrap_or_default();

    // Name normalization is best-effort: a normalizer error must not fail
    // the stage, the raw name is searched instead
    let mut search_name = drug_name.to_string();
    if let Some(normalizer) = &connectors.normalizer {
        match normalizer.normalize(drug_name).await {
            Ok(Some(normalized)) => search_name = normalized,
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(
                    nct_id = %trial.nct_id,
                    error = %e,
                    "Name normalization unavailable, using raw name"
                );
            }
        }
    }

    // Primary source; its errors propagate and fail the stage
    let primary = connectors
        .targets_primary
        .lookup_targets(&search_name)
        .await?;

    let mut enrichment = match primary {
        Some(lookup) => {
            let has_uniprot = lookup.targets.iter().any(|t| t.uniprot_id.is_some());
            TargetEnrichment {
                found: true,
                chembl_id: lookup.source_id,
                pref_name: lookup.pref_name,
                search_name: search_name.clone(),
                drugbank_fallback: false,
                has_uniprot_targets: has_uniprot,
                targets: lookup.targets,
            }
        }
        None => TargetEnrichment::not_found(search_name.clone()),
    };

    // Fallback when the primary produced no protein cross-references.
    // Fallback errors are best-effort: log and keep the primary result.
    if !enrichment.has_uniprot_targets {
        if let Some(fallback) = &connectors.targets_fallback {
            match fallback.lookup_targets(drug_name).await {
                Ok(Some(lookup)) => {
                    let has_uniprot = lookup.targets.iter().any(|t| t.uniprot_id.is_some());
                    enrichment.found = true;
                    enrichment.drugbank_fallback = true;
                    enrichment.targets = lookup.targets;
                    enrichment.has_uniprot_targets = has_uniprot;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        nct_id = %trial.nct_id,
                        source = fallback.name(),
                        error = %e,
                        "Fallback target lookup failed"
                    );
                }
            }
        }
    }

    Ok(enrichment)
}
