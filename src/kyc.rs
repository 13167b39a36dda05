//! KYC applicant snapshot types.
//!
//! The core never persists applicants; it consumes immutable snapshots
//! handed over by the [`KycStore`](crate::store::KycStore) collaborator and
//! binds them into evaluation contexts and transfer-gate checks.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// KYC lifecycle status of an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    PendingDocuments,
    Expired,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Draft => "DRAFT",
            KycStatus::Submitted => "SUBMITTED",
            KycStatus::UnderReview => "UNDER_REVIEW",
            KycStatus::Approved => "APPROVED",
            KycStatus::Rejected => "REJECTED",
            KycStatus::PendingDocuments => "PENDING_DOCUMENTS",
            KycStatus::Expired => "EXPIRED",
        }
    }
}

impl Display for KycStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Legal form of the investor behind an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestorType {
    Individual,
    Corporate,
    Trust,
    Partnership,
    Foundation,
}

impl InvestorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestorType::Individual => "INDIVIDUAL",
            InvestorType::Corporate => "CORPORATE",
            InvestorType::Trust => "TRUST",
            InvestorType::Partnership => "PARTNERSHIP",
            InvestorType::Foundation => "FOUNDATION",
        }
    }
}

impl Display for InvestorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccreditationStatus {
    Unknown,
    Accredited,
    NonAccredited,
}

impl AccreditationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccreditationStatus::Unknown => "UNKNOWN",
            AccreditationStatus::Accredited => "ACCREDITED",
            AccreditationStatus::NonAccredited => "NON_ACCREDITED",
        }
    }
}

impl Display for AccreditationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse risk rating carried on applicants, cases and screening outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable view of a KYC applicant as the core consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycApplicant {
    pub id: String,
    /// On-chain wallet address, if the applicant has linked one.
    pub wallet_address: Option<String>,
    pub investor_type: InvestorType,
    pub accreditation_status: AccreditationStatus,
    pub status: KycStatus,
    pub risk_level: RiskLevel,
    /// ISO 3166-1 alpha-2 country of residence.
    pub jurisdiction: Option<String>,
    pub is_pep: bool,
    pub is_sanctioned: bool,
    /// Administrative block, independent of KYC status.
    pub is_blocked: bool,
    pub annual_income: Option<f64>,
    pub net_worth: Option<f64>,
}

impl KycApplicant {
    /// Minimal approved applicant, useful as a test fixture base.
    pub fn approved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            wallet_address: None,
            investor_type: InvestorType::Individual,
            accreditation_status: AccreditationStatus::Unknown,
            status: KycStatus::Approved,
            risk_level: RiskLevel::Medium,
            jurisdiction: None,
            is_pep: false,
            is_sanctioned: false,
            is_blocked: false,
            annual_income: None,
            net_worth: None,
        }
    }
}
