//! Compliance case entity and derived-state policy.
//!
//! The case is a plain data record; everything derived (terminality,
//! overdue, escalation eligibility, due/escalation dates) is a pure function
//! of an immutable snapshot and an explicit `now`, so storage representation
//! stays decoupled from policy. Mutations happen in
//! [`crate::workflow::CaseWorkflow`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

use crate::kyc::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Open,
    UnderReview,
    PendingDocuments,
    PendingApproval,
    Approved,
    Rejected,
    Escalated,
    Closed,
    Expired,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "OPEN",
            CaseStatus::UnderReview => "UNDER_REVIEW",
            CaseStatus::PendingDocuments => "PENDING_DOCUMENTS",
            CaseStatus::PendingApproval => "PENDING_APPROVAL",
            CaseStatus::Approved => "APPROVED",
            CaseStatus::Rejected => "REJECTED",
            CaseStatus::Escalated => "ESCALATED",
            CaseStatus::Closed => "CLOSED",
            CaseStatus::Expired => "EXPIRED",
        }
    }

    /// Terminal cases accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::Approved | CaseStatus::Rejected | CaseStatus::Closed | CaseStatus::Expired
        )
    }
}

impl Display for CaseStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CasePriority {
    Low,
    Normal,
    High,
    Urgent,
    Critical,
}

impl CasePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            CasePriority::Low => "LOW",
            CasePriority::Normal => "NORMAL",
            CasePriority::High => "HIGH",
            CasePriority::Urgent => "URGENT",
            CasePriority::Critical => "CRITICAL",
        }
    }

    /// Time allotted before a case of this priority is due.
    pub fn due_window(&self) -> Duration {
        match self {
            CasePriority::Critical => Duration::hours(4),
            CasePriority::High => Duration::hours(24),
            CasePriority::Normal => Duration::days(3),
            CasePriority::Low => Duration::days(7),
            // Not in the policy table; takes the default bucket.
            CasePriority::Urgent => Duration::hours(24),
        }
    }

    /// Grace period past the due date before escalation fires.
    pub fn escalation_offset(&self) -> Duration {
        match self {
            CasePriority::Critical => Duration::hours(2),
            CasePriority::High => Duration::hours(6),
            CasePriority::Normal => Duration::hours(12),
            CasePriority::Low | CasePriority::Urgent => Duration::hours(24),
        }
    }

    /// One step up the escalation ladder. `Critical` is absorbing.
    pub fn escalated(&self) -> CasePriority {
        match self {
            CasePriority::Low => CasePriority::Normal,
            CasePriority::Normal => CasePriority::High,
            CasePriority::High => CasePriority::Critical,
            CasePriority::Urgent => CasePriority::Critical,
            CasePriority::Critical => CasePriority::Critical,
        }
    }

    /// Severity rank, used to verify escalation monotonicity.
    pub fn rank(&self) -> u8 {
        match self {
            CasePriority::Low => 0,
            CasePriority::Normal => 1,
            CasePriority::High => 2,
            CasePriority::Urgent => 3,
            CasePriority::Critical => 4,
        }
    }
}

impl Display for CasePriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseType {
    KycVerification,
    DocumentVerification,
    SanctionsScreening,
    AmlInvestigation,
    PepReview,
    TransferApproval,
    ComplianceViolation,
    Custom,
}

impl CaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::KycVerification => "KYC_VERIFICATION",
            CaseType::DocumentVerification => "DOCUMENT_VERIFICATION",
            CaseType::SanctionsScreening => "SANCTIONS_SCREENING",
            CaseType::AmlInvestigation => "AML_INVESTIGATION",
            CaseType::PepReview => "PEP_REVIEW",
            CaseType::TransferApproval => "TRANSFER_APPROVAL",
            CaseType::ComplianceViolation => "COMPLIANCE_VIOLATION",
            CaseType::Custom => "CUSTOM",
        }
    }

    /// Prefix used in generated case numbers, e.g. `KYC-...`.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            CaseType::KycVerification => "KYC",
            CaseType::DocumentVerification => "DOCUMENT",
            CaseType::SanctionsScreening => "SANCTIONS",
            CaseType::AmlInvestigation => "AML",
            CaseType::PepReview => "PEP",
            CaseType::TransferApproval => "TRANSFER",
            CaseType::ComplianceViolation => "COMPLIANCE",
            CaseType::Custom => "CUSTOM",
        }
    }
}

impl Display for CaseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Approve,
    Reject,
    ApproveWithConditions,
    RequireAdditionalDocuments,
    Escalate,
    ReferToLegal,
    NoDecision,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Approve => "APPROVE",
            DecisionType::Reject => "REJECT",
            DecisionType::ApproveWithConditions => "APPROVE_WITH_CONDITIONS",
            DecisionType::RequireAdditionalDocuments => "REQUIRE_ADDITIONAL_DOCUMENTS",
            DecisionType::Escalate => "ESCALATE",
            DecisionType::ReferToLegal => "REFER_TO_LEGAL",
            DecisionType::NoDecision => "NO_DECISION",
        }
    }
}

impl Display for DecisionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Workflow action attempted on a case; names invalid-transition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransition {
    Assign,
    Escalate,
    Decide,
    Expire,
}

impl Display for CaseTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseTransition::Assign => write!(f, "assign"),
            CaseTransition::Escalate => write!(f, "escalate"),
            CaseTransition::Decide => write!(f, "decide"),
            CaseTransition::Expire => write!(f, "expire"),
        }
    }
}

/// One entry in a case's escalation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
    pub escalated_by: String,
    pub reason: String,
    pub old_priority: CasePriority,
    pub new_priority: CasePriority,
    pub escalated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A unit of manual compliance-review work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCase {
    pub id: String,
    pub applicant_id: String,
    /// Unique, generated, e.g. `KYC-1717243200000-X4K9PF`.
    pub case_number: String,
    pub case_type: CaseType,
    pub title: String,
    pub description: String,
    pub status: CaseStatus,
    pub priority: CasePriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_notes: Option<String>,
    /// Always derived from priority at the moment it is set.
    pub due_date: DateTime<Utc>,
    /// Always `due_date` plus the priority's escalation offset.
    pub escalation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    /// Whole hours from creation to decision, rounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalations: Vec<EscalationRecord>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComplianceCase {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && now > self.due_date
    }

    pub fn needs_escalation(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && now > self.escalation_date
    }

    pub fn can_be_assigned(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_be_escalated(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_be_decided(&self) -> bool {
        !self.is_terminal()
    }
}

/// Compute due and escalation dates for a priority at `now`.
pub fn deadlines(priority: CasePriority, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let due_date = now + priority.due_window();
    let escalation_date = due_date + priority.escalation_offset();
    (due_date, escalation_date)
}

/// Resolution time in whole hours, rounded half-up.
pub fn resolution_hours(created_at: DateTime<Utc>, decided_at: DateTime<Utc>) -> i64 {
    let minutes = (decided_at - created_at).num_minutes();
    (minutes as f64 / 60.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn critical_deadlines() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (due, escalation) = deadlines(CasePriority::Critical, now);
        assert_eq!(due, now + Duration::hours(4));
        assert_eq!(escalation, now + Duration::hours(6));
    }

    #[test]
    fn normal_deadlines() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (due, escalation) = deadlines(CasePriority::Normal, now);
        assert_eq!(due, now + Duration::days(3));
        assert_eq!(escalation, due + Duration::hours(12));
    }

    #[test]
    fn escalation_ladder_is_monotonic() {
        for priority in [
            CasePriority::Low,
            CasePriority::Normal,
            CasePriority::High,
            CasePriority::Urgent,
            CasePriority::Critical,
        ] {
            assert!(priority.escalated().rank() >= priority.rank());
        }
        assert_eq!(CasePriority::Critical.escalated(), CasePriority::Critical);
        assert_eq!(CasePriority::High.escalated(), CasePriority::Critical);
        assert_eq!(CasePriority::Low.escalated(), CasePriority::Normal);
    }

    #[test]
    fn terminal_statuses() {
        assert!(CaseStatus::Approved.is_terminal());
        assert!(CaseStatus::Rejected.is_terminal());
        assert!(CaseStatus::Closed.is_terminal());
        assert!(CaseStatus::Expired.is_terminal());
        assert!(!CaseStatus::Open.is_terminal());
        assert!(!CaseStatus::Escalated.is_terminal());
        assert!(!CaseStatus::UnderReview.is_terminal());
    }

    #[test]
    fn resolution_hours_rounds() {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            resolution_hours(created, created + Duration::minutes(90)),
            2
        );
        assert_eq!(
            resolution_hours(created, created + Duration::minutes(89)),
            1
        );
        assert_eq!(resolution_hours(created, created), 0);
    }
}
