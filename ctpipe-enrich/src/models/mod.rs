//! Data models for the enrichment pipeline

pub mod analysis;
pub mod enrichment;
pub mod run;
pub mod trial;

pub use analysis::{Confidence, FailureCategory, LlmAnalysis};
pub use enrichment::{
    AdverseEventData, CtGovStudy, DoseInfo, DrugTarget, FailureEnrichment, Ic50Measurement,
    NetworkFeatures, PpiEnrichment, PpiInteraction, PubmedRef, RegistryDocument, SaeSummary,
    TargetEnrichment,
};
pub use run::{PipelineRun, RunKind, RunState};
pub use trial::{EnrichmentStatus, SeedRecord, Stage, StageStatus, TrialRecord};
