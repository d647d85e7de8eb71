//! Classification prompts and response parsing
//!
//! Both passes use a rigid three/four-line structured output format.
//! Unparseable fields fall back to conservative defaults rather than
//! raising: `FAILURE_ADMINISTRATIVE`/`low` for pass 1, `medium` confidence
//! for pass 2.

use crate::models::{Confidence, FailureCategory, TrialRecord};

/// Character budget for the detailed description in the pass-1 prompt
const PASS1_DESCRIPTION_BUDGET: usize = 1000;
/// Tighter budget for the pass-2 evidence excerpt
const PASS2_DESCRIPTION_BUDGET: usize = 500;

/// Pass-1 output
#[derive(Debug, Clone, PartialEq)]
pub struct InitialClassification {
    pub category: FailureCategory,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// Pass-2 output
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub passed: bool,
    pub confidence: Confidence,
    pub contradictions: Vec<String>,
    pub revised_category: Option<FailureCategory>,
}

/// Truncate to a character budget (not bytes, to stay on char boundaries)
fn truncate_chars(s: &str, budget: usize) -> String {
    s.chars().take(budget).collect()
}

fn description_excerpt(trial: &TrialRecord, budget: usize) -> String {
    trial
        .failure_enrichment
        .as_ref()
        .and_then(|f| {
            f.registry_description
                .clone()
                .or_else(|| f.ctgov.as_ref().and_then(|c| c.detailed_description.clone()))
        })
        .map(|d| truncate_chars(&d, budget))
        .unwrap_or_else(|| "None".to_string())
}

/// Build the pass-1 classification prompt
pub fn build_classification_prompt(trial: &TrialRecord) -> String {
    let description = description_excerpt(trial, PASS1_DESCRIPTION_BUDGET);
    let pubmed_count = trial
        .failure_enrichment
        .as_ref()
        .map(|f| f.pubmed_results.len())
        .unwrap_or(0);

    format!(
        r#"You are analyzing a clinical trial that was terminated, suspended, or withdrawn.

**Trial Information:**
- NCT ID: {nct_id}
- Drug: {drug}
- Title: {title}
- Status: {status}
- Official Reason: {why_stopped}

**Additional Context:**
- Detailed Description: {description}
- PubMed Publications: {pubmed_count} found
- Sponsor: {sponsor}

**Task:**
Classify the reason for trial failure into ONE of these categories:

1. **FAILURE_SAFETY**: Terminated due to safety concerns, adverse events, toxicity, or tolerability issues
2. **FAILURE_EFFICACY**: Terminated due to lack of efficacy, poor results, or inability to meet endpoints
3. **FAILURE_ADMINISTRATIVE**: Terminated due to enrollment issues, funding, strategic decisions, or operational problems

**Output Format:**
Category: [FAILURE_SAFETY | FAILURE_EFFICACY | FAILURE_ADMINISTRATIVE]
Confidence: [high | medium | low]
Reasoning: [2-3 sentences explaining your classification based on the evidence]

**Example:**
Category: FAILURE_SAFETY
Confidence: high
Reasoning: The detailed description mentions "unexpected toxicity events" and "safety concerns leading to early termination." The official reason states "adverse events," confirming safety-related failure.
"#,
        nct_id = trial.nct_id,
        drug = trial.drug_name.as_deref().unwrap_or("Unknown"),
        title = trial.title.as_deref().unwrap_or("Unknown"),
        status = trial.overall_status.as_deref().unwrap_or("Unknown"),
        why_stopped = trial.why_stopped.as_deref().unwrap_or("Not provided"),
        description = description,
        pubmed_count = pubmed_count,
        sponsor = trial.sponsor.as_deref().unwrap_or("Unknown"),
    )
}

/// Build the pass-2 self-verification prompt
pub fn build_verification_prompt(
    trial: &TrialRecord,
    classification: &InitialClassification,
) -> String {
    let description = description_excerpt(trial, PASS2_DESCRIPTION_BUDGET);

    format!(
        r#"You previously classified this clinical trial as:
Category: {category}
Confidence: {confidence}
Reasoning: {reasoning}

**Re-examine the evidence and check for:**
1. Any contradictions in the data
2. Whether the confidence level is appropriate
3. If a different category might be more accurate

**Trial Data:**
- Official Reason: {why_stopped}
- Description Excerpt: {description}...
- Sponsor: {sponsor}

**Output Format:**
Verification: [PASS | FAIL]
Final Confidence: [high | medium | low]
Contradictions Found: [List any contradictions, or "None"]
Revised Category (if needed): [Same category or new one]

**Example:**
Verification: PASS
Final Confidence: high
Contradictions Found: None
Revised Category: FAILURE_SAFETY
"#,
        category = classification.category,
        confidence = classification.confidence,
        reasoning = classification.reasoning,
        why_stopped = trial.why_stopped.as_deref().unwrap_or("Not provided"),
        description = description,
        sponsor = trial.sponsor.as_deref().unwrap_or("Unknown"),
    )
}

/// Parse the pass-1 structured response
pub fn parse_classification(text: &str) -> InitialClassification {
    let mut result = InitialClassification {
        category: FailureCategory::Administrative,
        confidence: Confidence::Low,
        reasoning: String::new(),
    };

    for line in text.lines() {
        if let Some(value) = line.strip_prefix("Category:") {
            if let Some(category) = FailureCategory::parse(value) {
                result.category = category;
            }
        } else if let Some(value) = line.strip_prefix("Confidence:") {
            if let Some(confidence) = Confidence::parse(value) {
                result.confidence = confidence;
            }
        } else if let Some(value) = line.strip_prefix("Reasoning:") {
            result.reasoning = value.trim().to_string();
        }
    }

    result
}

/// Parse the pass-2 structured response
pub fn parse_verification(text: &str) -> Verification {
    let mut result = Verification {
        passed: true,
        confidence: Confidence::Medium,
        contradictions: Vec::new(),
        revised_category: None,
    };

    for line in text.lines() {
        if line.starts_with("Verification:") {
            result.passed = line.contains("PASS");
        } else if let Some(value) = line.strip_prefix("Final Confidence:") {
            if let Some(confidence) = Confidence::parse(value) {
                result.confidence = confidence;
            }
        } else if let Some(value) = line.strip_prefix("Contradictions Found:") {
            let value = value.trim();
            if !value.is_empty() && value != "None" {
                result.contradictions = vec![value.to_string()];
            }
        } else if line.starts_with("Revised Category") {
            if let Some((_, value)) = line.split_once(':') {
                result.revised_category = FailureCategory::parse(value);
            }
        }
    }

    result
}
