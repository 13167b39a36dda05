//! Case lifecycle workflow.
//!
//! All mutations go through here: load the stored snapshot, validate the
//! transition against the current status, build the replacement record, and
//! persist it with a single [`CaseStore::put`]. Each successful transition
//! emits exactly one audit record with the old and new values of the fields
//! it touched. Time never comes from the clock; callers pass `now` so every
//! transition is replayable.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditLevel, AuditRecord, AuditSink};
use crate::case::{
    deadlines, resolution_hours, CasePriority, CaseStatus, CaseTransition, CaseType,
    ComplianceCase, DecisionType, EscalationRecord,
};
use crate::error::{ComplianceError, Result};
use crate::kyc::RiskLevel;
use crate::store::{CaseStore, KycStore};

const AUDIT_ENTITY: &str = "ComplianceCase";

#[derive(Debug, Clone)]
pub struct CreateCaseRequest {
    pub applicant_id: String,
    pub case_type: CaseType,
    pub title: String,
    pub description: String,
    pub priority: CasePriority,
    pub risk_level: Option<RiskLevel>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct AssignCaseRequest {
    pub case_id: String,
    pub assigned_to: String,
    pub assigned_by: String,
    pub notes: Option<String>,
    /// When set, the case is reprioritized and its deadlines recomputed.
    pub priority: Option<CasePriority>,
}

#[derive(Debug, Clone)]
pub struct EscalateCaseRequest {
    pub case_id: String,
    pub escalated_by: String,
    pub reason: String,
    pub notes: Option<String>,
    pub new_assignee: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DecideCaseRequest {
    pub case_id: String,
    pub decision: DecisionType,
    pub reason: String,
    pub notes: Option<String>,
    pub decided_by: String,
}

/// Orchestrates case transitions against the case store, resolving
/// applicants through the KYC store and emitting the audit trail.
pub struct CaseWorkflow {
    cases: Arc<dyn CaseStore>,
    kyc: Arc<dyn KycStore>,
    audit: Arc<dyn AuditSink>,
}

impl CaseWorkflow {
    pub fn new(cases: Arc<dyn CaseStore>, kyc: Arc<dyn KycStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { cases, kyc, audit }
    }

    /// Open a new case for an existing applicant.
    pub async fn create(
        &self,
        request: CreateCaseRequest,
        now: DateTime<Utc>,
    ) -> Result<ComplianceCase> {
        if self.kyc.applicant(&request.applicant_id).await?.is_none() {
            return Err(ComplianceError::ApplicantNotFound(request.applicant_id));
        }

        let case_number = generate_case_number(request.case_type, now);
        let (due_date, escalation_date) = deadlines(request.priority, now);
        let case = ComplianceCase {
            id: format!("case-{}", random_suffix(12).to_lowercase()),
            applicant_id: request.applicant_id,
            case_number: case_number.clone(),
            case_type: request.case_type,
            title: request.title,
            description: request.description,
            status: CaseStatus::Open,
            priority: request.priority,
            assigned_to: None,
            assigned_by: None,
            assigned_at: None,
            assignment_notes: None,
            due_date,
            escalation_date,
            risk_level: request.risk_level,
            decision: None,
            decision_reason: None,
            decision_notes: None,
            decided_by: None,
            decided_at: None,
            resolution_hours: None,
            escalations: vec![],
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
        };
        self.cases.put(case.clone()).await?;

        info!(
            case_id = %case.id,
            case_number = %case.case_number,
            priority = %case.priority,
            "compliance case created"
        );
        self.audit.record(AuditRecord {
            timestamp: now,
            action: AuditAction::Create,
            level: AuditLevel::Info,
            entity_type: AUDIT_ENTITY.to_string(),
            entity_id: case.id.clone(),
            description: format!("Case {} created ({})", case.case_number, case.case_type),
            actor: None,
            old_values: None,
            new_values: Some(values(&[
                ("status", json!(case.status)),
                ("priority", json!(case.priority)),
                ("caseType", json!(case.case_type)),
                ("dueDate", json!(case.due_date)),
                ("escalationDate", json!(case.escalation_date)),
            ])),
            metadata: None,
        });
        Ok(case)
    }

    /// Assign a case to a reviewer. Opens move to under-review; an optional
    /// priority change recomputes the deadlines.
    pub async fn assign(
        &self,
        request: AssignCaseRequest,
        now: DateTime<Utc>,
    ) -> Result<ComplianceCase> {
        let case = self.load(&request.case_id).await?;
        if !case.can_be_assigned() {
            return Err(ComplianceError::InvalidTransition {
                from: case.status,
                action: CaseTransition::Assign,
            });
        }

        let mut updated = case.clone();
        updated.assigned_to = Some(request.assigned_to.clone());
        updated.assigned_by = Some(request.assigned_by.clone());
        updated.assigned_at = Some(now);
        updated.assignment_notes = request.notes.clone();
        if updated.status == CaseStatus::Open {
            updated.status = CaseStatus::UnderReview;
        }
        if let Some(priority) = request.priority {
            updated.priority = priority;
            let (due_date, escalation_date) = deadlines(priority, now);
            updated.due_date = due_date;
            updated.escalation_date = escalation_date;
        }
        updated.updated_at = now;
        self.cases.put(updated.clone()).await?;

        info!(case_id = %updated.id, assigned_to = %request.assigned_to, "case assigned");
        self.audit.record(AuditRecord {
            timestamp: now,
            action: AuditAction::Assignment,
            level: AuditLevel::Info,
            entity_type: AUDIT_ENTITY.to_string(),
            entity_id: updated.id.clone(),
            description: format!(
                "Case {} assigned to {}",
                updated.case_number, request.assigned_to
            ),
            actor: Some(request.assigned_by),
            old_values: Some(values(&[
                ("status", json!(case.status)),
                ("priority", json!(case.priority)),
                ("assignedTo", json!(case.assigned_to)),
            ])),
            new_values: Some(values(&[
                ("status", json!(updated.status)),
                ("priority", json!(updated.priority)),
                ("assignedTo", json!(updated.assigned_to)),
            ])),
            metadata: None,
        });
        Ok(updated)
    }

    /// Escalate a case one priority step, recomputing deadlines from the new
    /// priority at `now` and appending to the escalation history.
    pub async fn escalate(
        &self,
        request: EscalateCaseRequest,
        now: DateTime<Utc>,
    ) -> Result<ComplianceCase> {
        let case = self.load(&request.case_id).await?;
        if !case.can_be_escalated() {
            return Err(ComplianceError::InvalidTransition {
                from: case.status,
                action: CaseTransition::Escalate,
            });
        }

        let old_priority = case.priority;
        let new_priority = old_priority.escalated();
        let (due_date, escalation_date) = deadlines(new_priority, now);

        let mut updated = case.clone();
        updated.status = CaseStatus::Escalated;
        updated.priority = new_priority;
        updated.due_date = due_date;
        updated.escalation_date = escalation_date;
        if let Some(assignee) = &request.new_assignee {
            updated.assigned_to = Some(assignee.clone());
            updated.assigned_by = Some(request.escalated_by.clone());
            updated.assigned_at = Some(now);
        }
        updated.escalations.push(EscalationRecord {
            escalated_by: request.escalated_by.clone(),
            reason: request.reason.clone(),
            old_priority,
            new_priority,
            escalated_at: now,
            notes: request.notes.clone(),
        });
        updated.updated_at = now;
        self.cases.put(updated.clone()).await?;

        warn!(
            case_id = %updated.id,
            old_priority = %old_priority,
            new_priority = %new_priority,
            reason = %request.reason,
            "case escalated"
        );
        self.audit.record(AuditRecord {
            timestamp: now,
            action: AuditAction::Escalation,
            level: AuditLevel::Warning,
            entity_type: AUDIT_ENTITY.to_string(),
            entity_id: updated.id.clone(),
            description: format!(
                "Case {} escalated from {} to {}: {}",
                updated.case_number, old_priority, new_priority, request.reason
            ),
            actor: Some(request.escalated_by),
            old_values: Some(values(&[
                ("status", json!(case.status)),
                ("priority", json!(old_priority)),
                ("dueDate", json!(case.due_date)),
            ])),
            new_values: Some(values(&[
                ("status", json!(updated.status)),
                ("priority", json!(new_priority)),
                ("dueDate", json!(updated.due_date)),
            ])),
            metadata: None,
        });
        Ok(updated)
    }

    /// Record a decision and close the case. The status becomes `CLOSED`
    /// whatever the decision value; deciding a terminal case is an error.
    pub async fn decide(
        &self,
        request: DecideCaseRequest,
        now: DateTime<Utc>,
    ) -> Result<ComplianceCase> {
        let case = self.load(&request.case_id).await?;
        if !case.can_be_decided() {
            return Err(ComplianceError::InvalidTransition {
                from: case.status,
                action: CaseTransition::Decide,
            });
        }

        let mut updated = case.clone();
        updated.status = CaseStatus::Closed;
        updated.decision = Some(request.decision);
        updated.decision_reason = Some(request.reason.clone());
        updated.decision_notes = request.notes.clone();
        updated.decided_by = Some(request.decided_by.clone());
        updated.decided_at = Some(now);
        updated.resolution_hours = Some(resolution_hours(case.created_at, now));
        updated.updated_at = now;
        self.cases.put(updated.clone()).await?;

        info!(
            case_id = %updated.id,
            decision = %request.decision,
            resolution_hours = ?updated.resolution_hours,
            "case decided"
        );
        self.audit.record(AuditRecord {
            timestamp: now,
            action: AuditAction::Decision,
            level: AuditLevel::Info,
            entity_type: AUDIT_ENTITY.to_string(),
            entity_id: updated.id.clone(),
            description: format!(
                "Case {} decided: {} ({})",
                updated.case_number, request.decision, request.reason
            ),
            actor: Some(request.decided_by),
            old_values: Some(values(&[
                ("status", json!(case.status)),
                ("decision", json!(case.decision)),
            ])),
            new_values: Some(values(&[
                ("status", json!(updated.status)),
                ("decision", json!(updated.decision)),
                ("resolutionHours", json!(updated.resolution_hours)),
            ])),
            metadata: None,
        });
        Ok(updated)
    }

    /// Mark a non-terminal case as expired. Driven by an external sweep; the
    /// sweep mechanism itself lives outside the core.
    pub async fn expire(&self, case_id: &str, now: DateTime<Utc>) -> Result<ComplianceCase> {
        let case = self.load(case_id).await?;
        if case.is_terminal() {
            return Err(ComplianceError::InvalidTransition {
                from: case.status,
                action: CaseTransition::Expire,
            });
        }

        let mut updated = case.clone();
        updated.status = CaseStatus::Expired;
        updated.updated_at = now;
        self.cases.put(updated.clone()).await?;

        warn!(case_id = %updated.id, "case expired");
        self.audit.record(AuditRecord {
            timestamp: now,
            action: AuditAction::Expiration,
            level: AuditLevel::Info,
            entity_type: AUDIT_ENTITY.to_string(),
            entity_id: updated.id.clone(),
            description: format!("Case {} expired", updated.case_number),
            actor: None,
            old_values: Some(values(&[("status", json!(case.status))])),
            new_values: Some(values(&[("status", json!(updated.status))])),
            metadata: None,
        });
        Ok(updated)
    }

    async fn load(&self, case_id: &str) -> Result<ComplianceCase> {
        self.cases
            .get(case_id)
            .await?
            .ok_or_else(|| ComplianceError::CaseNotFound(case_id.to_string()))
    }
}

/// Generate a case number, e.g. `SANCTIONS-1717243200000-X4K9PF`.
fn generate_case_number(case_type: CaseType, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        case_type.number_prefix(),
        now.timestamp_millis(),
        random_suffix(6)
    )
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

fn values(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
