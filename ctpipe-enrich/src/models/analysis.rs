//! Classification result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enrichment::SaeSummary;

/// Failure category assigned by the classification engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCategory {
    /// Safety concerns, adverse events, toxicity, tolerability
    #[serde(rename = "FAILURE_SAFETY")]
    Safety,
    /// Lack of efficacy, poor results, missed endpoints
    #[serde(rename = "FAILURE_EFFICACY")]
    Efficacy,
    /// Enrollment, funding, strategic or operational problems
    #[serde(rename = "FAILURE_ADMINISTRATIVE")]
    Administrative,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Safety => "FAILURE_SAFETY",
            FailureCategory::Efficacy => "FAILURE_EFFICACY",
            FailureCategory::Administrative => "FAILURE_ADMINISTRATIVE",
        }
    }

    /// Parse a category token, tolerating surrounding noise in model output
    pub fn parse(s: &str) -> Option<FailureCategory> {
        let s = s.trim();
        if s.contains("FAILURE_SAFETY") {
            Some(FailureCategory::Safety)
        } else if s.contains("FAILURE_EFFICACY") {
            Some(FailureCategory::Efficacy)
        } else if s.contains("FAILURE_ADMINISTRATIVE") {
            Some(FailureCategory::Administrative)
        } else {
            None
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification confidence, ordinal (`low < medium < high`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Confidence> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finalized classification result for one trial.
///
/// Produced either by the deterministic safety override (no model call) or
/// by the two-pass model protocol; `heuristic_override` records provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub classification: FailureCategory,
    pub confidence: Confidence,
    pub reasoning: String,
    pub heuristic_override: bool,
    /// Pass-2 verdict; `true` for heuristic overrides (nothing to contradict)
    pub verification_passed: bool,
    pub contradictions_found: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sae_summary: Option<SaeSummary>,
    pub analysis_timestamp: DateTime<Utc>,
    /// Model identifier; `None` for heuristic overrides
    pub model: Option<String>,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test]
    fn test_category_parse_tolerates_noise() {
        assert_eq!(
            FailureCategory::parse("**FAILURE_SAFETY**"),
            Some(FailureCategory::Safety)
        );
        assert_eq!(FailureCategory::parse("no category here"), None);
    }

    #[test]
    fn test_category_serde_wire_format() {
        let json = serde_json::to_string(&FailureCategory::Efficacy).unwrap();
        assert_eq!(json, "\"FAILURE_EFFICACY\"");
    }
}
