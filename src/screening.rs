//! Screening collaborator types.
//!
//! Sanctions/PEP/AML screening runs in an external provider. The core only
//! consumes its scored outcomes: any unresolved hit is a hard block in the
//! transfer gate, and provider risk scores feed the blended transfer risk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningType {
    Sanctions,
    Aml,
    Pep,
    AdverseMedia,
    PoliticalExposure,
    CriminalRecord,
    TerrorismFinancing,
}

impl ScreeningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreeningType::Sanctions => "SANCTIONS",
            ScreeningType::Aml => "AML",
            ScreeningType::Pep => "PEP",
            ScreeningType::AdverseMedia => "ADVERSE_MEDIA",
            ScreeningType::PoliticalExposure => "POLITICAL_EXPOSURE",
            ScreeningType::CriminalRecord => "CRIMINAL_RECORD",
            ScreeningType::TerrorismFinancing => "TERRORISM_FINANCING",
        }
    }
}

impl Display for ScreeningType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider verdict for one screening run.
///
/// `FalsePositive` is a resolved hit and does not block; `Hit` always does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningResult {
    Clear,
    Hit,
    FalsePositive,
    Inconclusive,
    Error,
}

impl ScreeningResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreeningResult::Clear => "CLEAR",
            ScreeningResult::Hit => "HIT",
            ScreeningResult::FalsePositive => "FALSE_POSITIVE",
            ScreeningResult::Inconclusive => "INCONCLUSIVE",
            ScreeningResult::Error => "ERROR",
        }
    }
}

impl Display for ScreeningResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single match reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningFinding {
    pub list_name: String,
    pub entity_name: Option<String>,
    pub match_score: Option<f64>,
    pub details: Option<String>,
}

/// One completed screening for an applicant, as stored by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningOutcome {
    pub applicant_id: String,
    pub screening_type: ScreeningType,
    pub result: ScreeningResult,
    /// Provider risk score in [0, 100], when the provider reports one.
    pub risk_score: Option<f64>,
    pub summary: Option<String>,
    pub findings: Vec<ScreeningFinding>,
    pub screened_at: DateTime<Utc>,
}

impl ScreeningOutcome {
    /// An unresolved hit blocks transfers unconditionally.
    pub fn is_blocking_hit(&self) -> bool {
        self.result == ScreeningResult::Hit
    }
}
