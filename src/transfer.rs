//! Transfer gate: the allow/deny decision for a token transfer.
//!
//! Three gates run in sequence and short-circuit on failure, in contrast to
//! the engine which always evaluates every rule: KYC status of both parties,
//! the compliance verdict on the sender's context, then screening hits for
//! either party. A collaborator failure anywhere denies the transfer with
//! maximum risk; the gate never fails open.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::context::EvaluationContext;
use crate::engine::ComplianceEngine;
use crate::error::Result;
use crate::kyc::{KycApplicant, KycStatus, RiskLevel};
use crate::rule::RuleAction;
use crate::screening::{ScreeningOutcome, ScreeningType};
use crate::store::{KycStore, RuleStore, ScreeningProvider};

/// Screening types whose unresolved hits block a transfer unconditionally.
const BLOCKING_SCREENINGS: [ScreeningType; 3] = [
    ScreeningType::Sanctions,
    ScreeningType::Pep,
    ScreeningType::Aml,
];

#[derive(Debug, Clone)]
pub struct TransferCheckRequest {
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub asset_id: String,
    /// Injected `now` for the whole check.
    pub timestamp: DateTime<Utc>,
}

/// Advisory restrictions attached to an allowed transfer. Enforcement is the
/// settlement system's responsibility, not this component's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRestrictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockup_period_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_window: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_jurisdictions: Vec<String>,
}

impl TransferRestrictions {
    fn is_empty(&self) -> bool {
        self.max_amount.is_none()
            && self.lockup_period_days.is_none()
            && self.transfer_window.is_none()
            && self.allowed_jurisdictions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCheckResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Blended risk in [0, 100]; higher is riskier.
    pub risk_score: f64,
    /// Blended compliance in [0, 100]; higher is cleaner.
    pub compliance_score: f64,
    pub requires_manual_review: bool,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<TransferRestrictions>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl TransferCheckResult {
    fn denied(reason: impl Into<String>, recommendations: Vec<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            risk_score: 100.0,
            compliance_score: 0.0,
            requires_manual_review: true,
            recommendations,
            restrictions: None,
            metadata: Map::new(),
        }
    }
}

/// Guards token transfers behind the KYC, rule and screening gates.
pub struct TransferGate {
    kyc: Arc<dyn KycStore>,
    rules: Arc<dyn RuleStore>,
    screening: Arc<dyn ScreeningProvider>,
    engine: ComplianceEngine,
    config: Arc<Config>,
}

impl TransferGate {
    pub fn new(
        kyc: Arc<dyn KycStore>,
        rules: Arc<dyn RuleStore>,
        screening: Arc<dyn ScreeningProvider>,
        config: Arc<Config>,
    ) -> Self {
        let engine = ComplianceEngine::new(rules.clone(), config.clone());
        Self {
            kyc,
            rules,
            screening,
            engine,
            config,
        }
    }

    /// Run the full gate sequence. Never returns an error: any internal
    /// failure collapses to a denial with risk 100.
    pub async fn check(&self, request: &TransferCheckRequest) -> TransferCheckResult {
        match self.check_inner(request).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    from = %request.from_address,
                    to = %request.to_address,
                    error = %e,
                    "transfer check failed, denying"
                );
                TransferCheckResult::denied(
                    format!("Transfer check failed: {}", e),
                    vec!["Retry the transfer check after resolving the failure".to_string()],
                )
            }
        }
    }

    async fn check_inner(&self, request: &TransferCheckRequest) -> Result<TransferCheckResult> {
        info!(
            from = %request.from_address,
            to = %request.to_address,
            asset = %request.asset_id,
            amount = %request.amount,
            "checking transfer compliance"
        );

        // Gate 1: both parties hold an approved, unblocked KYC record.
        let sender = self.kyc.applicant_by_address(&request.from_address).await?;
        let recipient = self.kyc.applicant_by_address(&request.to_address).await?;
        if let Some(denial) = kyc_denial("Sender", &request.from_address, sender.as_ref())
            .or_else(|| kyc_denial("Recipient", &request.to_address, recipient.as_ref()))
        {
            warn!(reason = %denial, "transfer denied at KYC gate");
            let mut result = TransferCheckResult::denied(
                denial,
                vec!["Complete KYC verification before transferring".to_string()],
            );
            result.metadata = party_metadata(sender.as_ref(), recipient.as_ref());
            return Ok(result);
        }
        // Both checked above.
        let sender = sender.ok_or_else(|| {
            crate::error::ComplianceError::ApplicantNotFound(request.from_address.clone())
        })?;
        let recipient = recipient.ok_or_else(|| {
            crate::error::ComplianceError::ApplicantNotFound(request.to_address.clone())
        })?;

        let kyc_risk = risk_level_score(sender.risk_level).max(risk_level_score(recipient.risk_level));
        let kyc_compliance = 100.0;

        // Gate 2: compliance verdict on the sender with the transfer bound in.
        let mut context = EvaluationContext::for_applicant(sender.clone(), request.timestamp);
        context.transfer_amount = request.amount.to_f64();
        context.asset_id = Some(request.asset_id.clone());
        context.from_address = Some(request.from_address.clone());
        context.to_address = Some(request.to_address.clone());
        let verdict = self.engine.evaluate(&context).await?;
        if !verdict.can_proceed {
            warn!(overall = %verdict.overall_result, "transfer denied at rule gate");
            let reason = verdict
                .highest_risk_rule
                .as_ref()
                .and_then(|r| r.reason.clone())
                .unwrap_or_else(|| "Compliance rules block this transfer".to_string());
            let mut result = TransferCheckResult::denied(reason, verdict.recommendations.clone());
            let mut metadata = party_metadata(Some(&sender), Some(&recipient));
            metadata.insert("ruleResults".to_string(), rule_lines(&verdict));
            result.metadata = metadata;
            return Ok(result);
        }
        let rules_risk = verdict.average_risk_score;
        let rules_compliance = if verdict.overall_result == crate::engine::OverallResult::Pass {
            100.0
        } else {
            50.0
        };

        // Gate 3: unresolved sanctions/PEP/AML hits block either party.
        let mut screenings = self.screening.screenings_for(&sender.id).await?;
        screenings.extend(self.screening.screenings_for(&recipient.id).await?);
        if let Some(hit) = screenings
            .iter()
            .find(|s| BLOCKING_SCREENINGS.contains(&s.screening_type) && s.is_blocking_hit())
        {
            warn!(
                applicant_id = %hit.applicant_id,
                screening = %hit.screening_type,
                "transfer denied at screening gate"
            );
            let mut result = TransferCheckResult::denied(
                format!(
                    "Unresolved {} screening hit for applicant {}",
                    hit.screening_type, hit.applicant_id
                ),
                vec!["Resolve the screening hit before transferring".to_string()],
            );
            let mut metadata = party_metadata(Some(&sender), Some(&recipient));
            metadata.insert("screenings".to_string(), screening_lines(&screenings));
            result.metadata = metadata;
            return Ok(result);
        }
        let screening_risk = screenings
            .iter()
            .filter_map(|s| s.risk_score)
            .fold(0.0_f64, f64::max);
        let screening_compliance = 100.0;

        let weights = &self.config.gate;
        let risk_score = (weights.kyc * kyc_risk
            + weights.rules * rules_risk
            + weights.screening * screening_risk)
            .clamp(0.0, 100.0);
        let compliance_score = (weights.kyc * kyc_compliance
            + weights.rules * rules_compliance
            + weights.screening * screening_compliance)
            .clamp(0.0, 100.0);

        let requires_manual_review = risk_score >= 70.0 || verdict.requires_manual_review;
        let mut recommendations = vec![risk_tier_recommendation(risk_score)];
        recommendations.extend(verdict.recommendations.clone());

        let restrictions = self.restrictions(request.timestamp).await?;
        let mut metadata = party_metadata(Some(&sender), Some(&recipient));
        metadata.insert("ruleResults".to_string(), rule_lines(&verdict));
        metadata.insert("screenings".to_string(), screening_lines(&screenings));

        info!(
            risk_score,
            compliance_score, requires_manual_review, "transfer allowed"
        );
        Ok(TransferCheckResult {
            allowed: true,
            reason: None,
            risk_score,
            compliance_score,
            requires_manual_review,
            recommendations,
            restrictions: Some(restrictions).filter(|r| !r.is_empty()),
            metadata,
        })
    }

    /// Advisory restrictions aggregated from effective restriction rules'
    /// action parameters.
    async fn restrictions(&self, now: DateTime<Utc>) -> Result<TransferRestrictions> {
        let mut restrictions = TransferRestrictions::default();
        for rule in self.rules.effective_rules(now).await? {
            if rule.action != RuleAction::ApplyRestrictions {
                continue;
            }
            let Some(params) = &rule.action_params else {
                continue;
            };
            if let Some(max) = params.get("maxAmount").and_then(decimal_param) {
                restrictions.max_amount = Some(match restrictions.max_amount {
                    Some(existing) => existing.min(max),
                    None => max,
                });
            }
            if let Some(days) = params.get("lockupPeriodDays").and_then(Value::as_u64) {
                let days = days.min(u32::MAX as u64) as u32;
                restrictions.lockup_period_days =
                    Some(restrictions.lockup_period_days.map_or(days, |d| d.max(days)));
            }
            if let Some(window) = params.get("transferWindow").and_then(Value::as_str) {
                restrictions.transfer_window = Some(window.to_string());
            }
            if let Some(jurisdictions) = params.get("allowedJurisdictions").and_then(Value::as_array)
            {
                for j in jurisdictions.iter().filter_map(Value::as_str) {
                    if !restrictions.allowed_jurisdictions.iter().any(|x| x == j) {
                        restrictions.allowed_jurisdictions.push(j.to_string());
                    }
                }
            }
        }
        Ok(restrictions)
    }
}

fn kyc_denial(role: &str, address: &str, applicant: Option<&KycApplicant>) -> Option<String> {
    match applicant {
        None => Some(format!("{} {} has no KYC record", role, address)),
        Some(a) if a.is_blocked => Some(format!("{} {} is blocked", role, a.id)),
        Some(a) if a.status != KycStatus::Approved => Some(format!(
            "{} {} KYC status is {}, not APPROVED",
            role, a.id, a.status
        )),
        Some(_) => None,
    }
}

fn risk_level_score(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 10.0,
        RiskLevel::Medium => 40.0,
        RiskLevel::High => 70.0,
        RiskLevel::Critical => 90.0,
    }
}

fn risk_tier_recommendation(risk_score: f64) -> String {
    if risk_score < 25.0 {
        "Low risk transfer - standard processing".to_string()
    } else if risk_score < 50.0 {
        "Medium risk transfer - additional monitoring recommended".to_string()
    } else if risk_score < 75.0 {
        "High risk transfer - enhanced due diligence required".to_string()
    } else {
        "Critical risk transfer - hold pending compliance sign-off".to_string()
    }
}

fn party_metadata(
    sender: Option<&KycApplicant>,
    recipient: Option<&KycApplicant>,
) -> Map<String, Value> {
    let status = |a: Option<&KycApplicant>| match a {
        Some(a) => json!({
            "applicantId": a.id,
            "kycStatus": a.status,
            "riskLevel": a.risk_level,
            "isBlocked": a.is_blocked,
        }),
        None => Value::Null,
    };
    let mut metadata = Map::new();
    metadata.insert("sender".to_string(), status(sender));
    metadata.insert("recipient".to_string(), status(recipient));
    metadata
}

fn rule_lines(verdict: &crate::engine::ComplianceVerdict) -> Value {
    Value::Array(
        verdict
            .evaluation_results
            .iter()
            .map(|r| {
                Value::String(format!(
                    "{}: {} (risk {})",
                    r.rule_name,
                    if r.passed { "PASSED" } else { "FAILED" },
                    r.risk_score
                ))
            })
            .collect(),
    )
}

fn screening_lines(screenings: &[ScreeningOutcome]) -> Value {
    Value::Array(
        screenings
            .iter()
            .map(|s| {
                Value::String(format!(
                    "{} {}: {}",
                    s.applicant_id, s.screening_type, s.result
                ))
            })
            .collect(),
    )
}

fn decimal_param(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::KycApplicant;
    use crate::rule::{
        ComplianceRule, LogicalOperator, RuleCondition, RuleOperator, RulePriority, RuleStatus,
        RuleType, ValueType,
    };
    use crate::screening::ScreeningResult;
    use crate::store::{MemoryKycStore, MemoryRuleStore, MemoryScreeningProvider};
    use chrono::TimeZone;

    struct Fixture {
        kyc: Arc<MemoryKycStore>,
        rules: Arc<MemoryRuleStore>,
        screening: Arc<MemoryScreeningProvider>,
    }

    impl Fixture {
        fn gate(&self) -> TransferGate {
            TransferGate::new(
                self.kyc.clone(),
                self.rules.clone(),
                self.screening.clone(),
                Arc::new(Config::default()),
            )
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn applicant(id: &str, address: &str) -> KycApplicant {
        let mut a = KycApplicant::approved(id);
        a.wallet_address = Some(address.to_string());
        a
    }

    fn fixture() -> Fixture {
        let kyc = Arc::new(MemoryKycStore::new());
        kyc.insert(applicant("sender", "0xaaa"));
        kyc.insert(applicant("recipient", "0xbbb"));
        Fixture {
            kyc,
            rules: Arc::new(MemoryRuleStore::new()),
            screening: Arc::new(MemoryScreeningProvider::new()),
        }
    }

    fn request() -> TransferCheckRequest {
        TransferCheckRequest {
            from_address: "0xaaa".to_string(),
            to_address: "0xbbb".to_string(),
            amount: Decimal::new(50_000, 0),
            asset_id: "asset-1".to_string(),
            timestamp: now(),
        }
    }

    fn deny_rule(id: &str, field: &str, value: Value) -> ComplianceRule {
        ComplianceRule {
            id: id.to_string(),
            name: format!("Rule {}", id),
            description: None,
            rule_type: RuleType::AmountLimit,
            status: RuleStatus::Active,
            priority: RulePriority::High,
            is_active: true,
            conditions: vec![RuleCondition {
                field: field.to_string(),
                operator: RuleOperator::LessThan,
                value,
                value_type: ValueType::Number,
                logical_operator: Some(LogicalOperator::And),
            }],
            action: RuleAction::Deny,
            action_params: None,
            effective_from: None,
            effective_until: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn hit(applicant_id: &str, screening_type: ScreeningType) -> ScreeningOutcome {
        ScreeningOutcome {
            applicant_id: applicant_id.to_string(),
            screening_type,
            result: ScreeningResult::Hit,
            risk_score: Some(95.0),
            summary: None,
            findings: vec![],
            screened_at: now(),
        }
    }

    #[tokio::test]
    async fn clean_transfer_is_allowed() {
        let fx = fixture();
        let result = fx.gate().check(&request()).await;
        assert!(result.allowed);
        assert!(result.reason.is_none());
        // kyc 0.3*40 + rules 0.4*0 + screening 0.3*0.
        assert!((result.risk_score - 12.0).abs() < 1e-9);
        assert!((result.compliance_score - 100.0).abs() < 1e-9);
        assert!(!result.requires_manual_review);
    }

    #[tokio::test]
    async fn unknown_sender_is_denied() {
        let fx = fixture();
        let mut req = request();
        req.from_address = "0xdead".to_string();
        let result = fx.gate().check(&req).await;
        assert!(!result.allowed);
        assert_eq!(result.risk_score, 100.0);
        assert!(result.reason.unwrap().contains("no KYC record"));
    }

    #[tokio::test]
    async fn unapproved_recipient_is_denied() {
        let fx = fixture();
        let mut pending = applicant("recipient", "0xbbb");
        pending.status = KycStatus::Submitted;
        fx.kyc.insert(pending);
        let result = fx.gate().check(&request()).await;
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("Recipient"));
    }

    #[tokio::test]
    async fn blocked_sender_is_denied() {
        let fx = fixture();
        let mut blocked = applicant("sender", "0xaaa");
        blocked.is_blocked = true;
        fx.kyc.insert(blocked);
        let result = fx.gate().check(&request()).await;
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("blocked"));
    }

    #[tokio::test]
    async fn deny_rule_blocks_transfer() {
        let fx = fixture();
        // Transfer amount must stay under 10k; the 50k request fails it.
        fx.rules
            .insert(deny_rule("amount-cap", "transferAmount", json!(10_000)));
        let result = fx.gate().check(&request()).await;
        assert!(!result.allowed);
        assert_eq!(result.risk_score, 100.0);
        assert!(result.metadata.contains_key("ruleResults"));
    }

    #[tokio::test]
    async fn sanctions_hit_blocks_either_party() {
        let fx = fixture();
        fx.screening.insert(hit("recipient", ScreeningType::Sanctions));
        let result = fx.gate().check(&request()).await;
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("SANCTIONS"));
    }

    #[tokio::test]
    async fn non_blocking_screening_raises_risk_only() {
        let fx = fixture();
        let mut media = hit("sender", ScreeningType::AdverseMedia);
        media.risk_score = Some(80.0);
        fx.screening.insert(media);
        let result = fx.gate().check(&request()).await;
        assert!(result.allowed);
        // kyc 0.3*40 + screening 0.3*80.
        assert!((result.risk_score - 36.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn restrictions_come_from_restriction_rules() {
        let fx = fixture();
        let mut rule = deny_rule("limits", "transferAmount", json!(1_000_000_000));
        rule.action = RuleAction::ApplyRestrictions;
        let mut params = Map::new();
        params.insert("maxAmount".to_string(), json!("250000"));
        params.insert("lockupPeriodDays".to_string(), json!(90));
        params.insert("allowedJurisdictions".to_string(), json!(["US", "DE"]));
        rule.action_params = Some(params);
        fx.rules.insert(rule);

        let result = fx.gate().check(&request()).await;
        assert!(result.allowed);
        let restrictions = result.restrictions.unwrap();
        assert_eq!(restrictions.max_amount, Some(Decimal::new(250_000, 0)));
        assert_eq!(restrictions.lockup_period_days, Some(90));
        assert_eq!(restrictions.allowed_jurisdictions, vec!["US", "DE"]);
    }
}
