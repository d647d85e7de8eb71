//! Sponsor classification
//!
//! Heuristic keyword match on the sponsor name. Industry keywords are
//! checked first, then academic, then government.

use serde::{Deserialize, Serialize};

/// Sponsor category for the exported dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorType {
    Industry,
    Academic,
    Government,
    Other,
    Unknown,
}

impl SponsorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorType::Industry => "industry",
            SponsorType::Academic => "academic",
            SponsorType::Government => "government",
            SponsorType::Other => "other",
            SponsorType::Unknown => "unknown",
        }
    }
}

const INDUSTRY_KEYWORDS: [&str; 10] = [
    "pharma",
    "therapeutics",
    "biotech",
    "inc",
    "ltd",
    "corporation",
    "labs",
    "gmbh",
    "ag",
    "sa",
];

const ACADEMIC_KEYWORDS: [&str; 6] = [
    "university",
    "college",
    "institute",
    "medical center",
    "hospital",
    "clinic",
];

const GOVERNMENT_KEYWORDS: [&str; 5] = ["nih", "niaid", "nci", "nhlbi", "national"];

/// Classify a sponsor name
pub fn classify_sponsor(sponsor: Option<&str>) -> SponsorType {
    let Some(sponsor) = sponsor.filter(|s| !s.trim().is_empty()) else {
        return SponsorType::Unknown;
    };

    let lower = sponsor.to_lowercase();

    if INDUSTRY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return SponsorType::Industry;
    }
    if ACADEMIC_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return SponsorType::Academic;
    }
    if GOVERNMENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return SponsorType::Government;
    }

    SponsorType::Other
}
