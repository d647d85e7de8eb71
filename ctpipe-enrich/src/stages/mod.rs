//! Stage executors
//!
//! Each executor is a pure async function of (record, connector set) →
//! payload. Executors never touch the database and never enqueue retries;
//! the orchestrator persists completions and converts errors into retry
//! queue entries. Re-running an executor on the same connector responses
//! produces an equivalent payload, so stage completion is an idempotent
//! overwrite.

mod failure_details;
mod ppi;
mod targets;

pub use failure_details::enrich_failure_details;
pub use ppi::enrich_ppi;
pub use targets::enrich_targets;
