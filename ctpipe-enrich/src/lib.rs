//! ctpipe-enrich library interface
//!
//! Staged enrichment of terminated clinical trial records: per-record stage
//! tracking, a durable retry queue with exponential backoff, two-pass LLM
//! failure classification with deterministic safety overrides, and a
//! quality-filtered dataset export.
//!
//! Exposes public APIs for integration testing.

pub mod analysis;
pub mod config;
pub mod connectors;
pub mod db;
pub mod export;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod stages;

pub use ctpipe_common::{Error, Result};
