//! ClinicalTrials.gov API v2 client
//!
//! Fetches the full study record and parses the adverse-events module
//! (serious/other event tables plus summary metrics) and dosing
//! information from the arms/interventions module.

use serde_json::Value;
use std::time::Duration;

use super::{ConnectorError, RateLimiter, StudyRegistry};
use crate::models::enrichment::{
    AdverseEventData, AdverseEventTerm, ArmGroup, CtGovStudy, DoseInfo, InterventionInfo,
    OtherEventGroup, SaeSummary, SeriousEventGroup,
};

const CTGOV_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/studies";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
const RATE_LIMIT_MS: u64 = 100;

/// ClinicalTrials.gov API client
pub struct CtGovClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl CtGovClient {
    pub fn new() -> Result<Self, ConnectorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }

    /// Parse a full API v2 study document into the stored shape
    fn parse_study(data: &Value) -> CtGovStudy {
        let protocol = data.get("protocolSection");
        let results = data.get("resultsSection");

        let description = protocol.and_then(|p| p.get("descriptionModule"));

        let adverse_events = results
            .and_then(|r| r.get("adverseEventsModule"))
            .map(Self::parse_adverse_events)
            .unwrap_or_else(AdverseEventData::not_found);

        let dose_info = protocol
            .and_then(|p| p.get("armsInterventionsModule"))
            .map(Self::parse_dose_info)
            .unwrap_or_else(DoseInfo::not_found);

        CtGovStudy {
            has_results: results.is_some(),
            brief_summary: str_field(description, "briefSummary"),
            detailed_description: str_field(description, "detailedDescription"),
            adverse_events,
            dose_info,
        }
    }

    /// Parse the adverse events module, computing summary metrics
    fn parse_adverse_events(module: &Value) -> AdverseEventData {
        let serious_events: Vec<SeriousEventGroup> = module
            .get("seriousEvents")
            .and_then(|s| s.get("eventGroups"))
            .and_then(|g| g.as_array())
            .map(|groups| {
                groups
                    .iter()
                    .map(|group| SeriousEventGroup {
                        title: str_field(Some(group), "title"),
                        deaths: u64_field(group, "deathsNumAffected"),
                        serious_affected: u64_field(group, "seriousNumAffected"),
                        serious_at_risk: u64_field(group, "seriousNumAtRisk"),
                        events: parse_event_terms(group.get("seriousEvents")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let other_events: Vec<OtherEventGroup> = module
            .get("otherEvents")
            .and_then(|s| s.get("eventGroups"))
            .and_then(|g| g.as_array())
            .map(|groups| {
                groups
                    .iter()
                    .map(|group| OtherEventGroup {
                        title: str_field(Some(group), "title"),
                        affected: u64_field(group, "otherNumAffected"),
                        at_risk: u64_field(group, "otherNumAtRisk"),
                        events: parse_event_terms(group.get("otherEvents")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let summary = SaeSummary::from_groups(&serious_events);

        AdverseEventData {
            found: true,
            frequency_threshold: str_field(Some(module), "frequencyThreshold"),
            time_frame: str_field(Some(module), "timeFrame"),
            description: str_field(Some(module), "description"),
            serious_events,
            other_events,
            summary,
        }
    }

    /// Parse dosing information from the arms/interventions module
    fn parse_dose_info(module: &Value) -> DoseInfo {
        let arms = module
            .get("armGroups")
            .and_then(|a| a.as_array())
            .map(|groups| {
                groups
                    .iter()
                    .map(|arm| ArmGroup {
                        label: str_field(Some(arm), "label"),
                        arm_type: str_field(Some(arm), "type"),
                        description: str_field(Some(arm), "description"),
                        intervention_names: str_list(arm.get("interventionNames")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let interventions = module
            .get("interventions")
            .and_then(|a| a.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| InterventionInfo {
                        intervention_type: str_field(Some(item), "type"),
                        name: str_field(Some(item), "name"),
                        description: str_field(Some(item), "description"),
                        arm_group_labels: str_list(item.get("armGroupLabels")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        DoseInfo {
            found: true,
            arms,
            interventions,
        }
    }
}

/// Per-term stats live in the first entry of the `stats` array
fn parse_event_terms(events: Option<&Value>) -> Vec<AdverseEventTerm> {
    events
        .and_then(|e| e.as_array())
        .map(|list| {
            list.iter()
                .map(|event| {
                    let stats = event
                        .get("stats")
                        .and_then(|s| s.as_array())
                        .and_then(|s| s.first());
                    AdverseEventTerm {
                        term: str_field(Some(event), "term"),
                        organ_system: str_field(Some(event), "assessmentType"),
                        affected: stats.map(|s| u64_field(s, "numAffected")).unwrap_or(0),
                        at_risk: stats.map(|s| u64_field(s, "numAtRisk")).unwrap_or(0),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn str_field(value: Option<&Value>, key: &str) -> Option<String> {
    value
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn str_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl StudyRegistry for CtGovClient {
    async fn fetch_study(&self, nct_id: &str) -> Result<Option<CtGovStudy>, ConnectorError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/{}", CTGOV_BASE_URL, nct_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(nct_id = %nct_id, "Study not in registry API");
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(status.as_u16(), error_text));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let study = Self::parse_study(&data);

        tracing::info!(
            nct_id = %nct_id,
            has_results = study.has_results,
            deaths = study.adverse_events.summary.total_deaths,
            "Registry study fetched"
        );

        Ok(Some(study))
    }
}
