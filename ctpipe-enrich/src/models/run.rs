//! Pipeline run bookkeeping
//!
//! One row per sweep/analysis/export invocation, persisted for
//! observability. A run left RUNNING by a dead process is marked FAILED at
//! the next startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of pass this run performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Ingest,
    Enrich,
    Retry,
    Analyze,
    Export,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Ingest => "ingest",
            RunKind::Enrich => "enrich",
            RunKind::Retry => "retry",
            RunKind::Analyze => "analyze",
            RunKind::Export => "export",
        }
    }
}

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// One pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub kind: RunKind,
    pub state: RunState,
    /// Records touched by this run
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Records (re)enqueued for retry during this run
    pub queued: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(kind: RunKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            kind,
            state: RunState::Running,
            processed: 0,
            succeeded: 0,
            failed: 0,
            queued: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a terminal state and stamp the end time
    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.ended_at = Some(Utc::now());
    }
}
