//! External enrichment connectors
//!
//! Each external source gets its own client struct with a per-connector
//! rate limit and timeout. Stage executors and the classification engine
//! only see the object-safe traits defined here, so tests substitute mock
//! implementations.
//!
//! The contract distinguishes "source has no data" (`Ok(None)` / empty)
//! from "source unreachable or malformed" (`Err`): only the latter is
//! retried. The retry policy is deliberately uniform — 4xx responses are
//! retried up to the same ceiling as network failures.

pub mod aact;
pub mod chembl;
pub mod ctgov;
pub mod pubchem;
pub mod pubmed;
pub mod rate_limit;
pub mod stringdb;
pub mod uniprot;

pub use aact::AactClient;
pub use chembl::ChemblClient;
pub use ctgov::CtGovClient;
pub use pubchem::PubChemClient;
pub use pubmed::PubMedClient;
pub use rate_limit::RateLimiter;
pub use stringdb::StringDbClient;
pub use uniprot::UniProtClient;

use std::sync::Arc;
use thiserror::Error;

use crate::models::{CtGovStudy, DrugTarget, PpiInteraction, PubmedRef, RegistryDocument};

/// Connector errors — every variant is queued for retry by the caller
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the connector's timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Unexpected HTTP status from the source
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the source's response
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ConnectorError {
    /// Map a reqwest error into the connector taxonomy
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectorError::Timeout(err.to_string())
        } else {
            ConnectorError::Network(err.to_string())
        }
    }
}

/// Target lookup result from a target/activity source
#[derive(Debug, Clone)]
pub struct TargetLookup {
    /// Source-side molecule identifier (e.g. ChEMBL molecule id)
    pub source_id: Option<String>,
    /// Preferred name reported by the source
    pub pref_name: Option<String>,
    pub targets: Vec<DrugTarget>,
}

/// Drug-name normalization via a compound registry (best-effort)
#[async_trait::async_trait]
pub trait CompoundNormalizer: Send + Sync {
    /// Resolve a preferred/systematic name for a raw drug name
    async fn normalize(&self, drug_name: &str) -> Result<Option<String>, ConnectorError>;
}

/// Target/activity lookup source
///
/// Implemented by the primary bioactivity source and by the
/// protein-registry fallback.
#[async_trait::async_trait]
pub trait TargetSource: Send + Sync {
    /// Source name for provenance tracking
    fn name(&self) -> &'static str;

    /// Look up targets for a drug name. `Ok(None)` means the source has no
    /// match — a successful call, not an error.
    async fn lookup_targets(&self, drug_name: &str)
        -> Result<Option<TargetLookup>, ConnectorError>;
}

/// Protein-interaction network source
#[async_trait::async_trait]
pub trait InteractionSource: Send + Sync {
    /// Interaction partners for one protein identifier
    async fn interactions(&self, protein_id: &str)
        -> Result<Vec<PpiInteraction>, ConnectorError>;
}

/// Literature search source
#[async_trait::async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Publications mentioning the trial or its drug
    async fn search(
        &self,
        nct_id: &str,
        drug_name: &str,
    ) -> Result<Vec<PubmedRef>, ConnectorError>;
}

/// Public trial registry API (study record with results section)
#[async_trait::async_trait]
pub trait StudyRegistry: Send + Sync {
    /// Fetch the study record; `Ok(None)` when the registry has no entry
    async fn fetch_study(&self, nct_id: &str) -> Result<Option<CtGovStudy>, ConnectorError>;
}

/// Upstream registry database (descriptions and document pointers)
#[async_trait::async_trait]
pub trait TrialRegistry: Send + Sync {
    async fn detailed_description(&self, nct_id: &str)
        -> Result<Option<String>, ConnectorError>;

    async fn documents(&self, nct_id: &str) -> Result<Vec<RegistryDocument>, ConnectorError>;
}

/// The full connector set handed to stage executors.
///
/// Optional slots mirror sources that may be unconfigured or unavailable;
/// stage executors degrade gracefully when they are absent.
#[derive(Clone)]
pub struct ConnectorSet {
    /// Drug-name normalization (best-effort, absence is fine)
    pub normalizer: Option<Arc<dyn CompoundNormalizer>>,
    /// Primary target/activity source; its errors fail the stage
    pub targets_primary: Arc<dyn TargetSource>,
    /// Secondary fallback when the primary finds no protein cross-refs
    pub targets_fallback: Option<Arc<dyn TargetSource>>,
    pub interactions: Arc<dyn InteractionSource>,
    pub literature: Arc<dyn LiteratureSource>,
    pub study_registry: Arc<dyn StudyRegistry>,
    /// Upstream registry database, absent when not configured
    pub trial_registry: Option<Arc<dyn TrialRegistry>>,
}
