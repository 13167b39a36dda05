//! Rule evaluator: all conditions of one rule, combined, scored.
//!
//! Conditions combine left to right. A condition that declares `OR` and
//! passed forces the *next* condition to count as passed regardless of its
//! own evaluation; the forced value participates in the next link, so
//! chained ORs cascade. This matches the deployed behavior of the rule
//! language and is deliberately preserved, including where it diverges from
//! conventional boolean OR over longer chains.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::{evaluate_condition, ConditionOutcome};
use crate::config::RiskPolicy;
use crate::context::EvaluationContext;
use crate::kyc::{AccreditationStatus, InvestorType};
use crate::rule::{ComplianceRule, LogicalOperator, RuleAction, RulePriority, RuleType};

/// Outcome of evaluating one rule against one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationResult {
    pub rule_id: String,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub passed: bool,
    /// Failed with `DENY` action: dominates the engine verdict.
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub details: String,
    /// Risk score in [0, 100].
    pub risk_score: u8,
    pub requires_manual_review: bool,
    pub recommendations: Vec<String>,
    pub metadata: Map<String, Value>,
}

impl RuleEvaluationResult {
    /// Fail-closed result for a rule that cannot be evaluated. An
    /// unevaluable rule must never silently pass.
    pub fn evaluation_error(rule: &ComplianceRule, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut metadata = Map::new();
        metadata.insert(
            "rulePriority".to_string(),
            Value::String(rule.priority.to_string()),
        );
        metadata.insert(
            "ruleAction".to_string(),
            Value::String(rule.action.to_string()),
        );
        metadata.insert("error".to_string(), Value::Bool(true));
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            rule_type: rule.rule_type,
            passed: false,
            blocked: true,
            reason: Some(reason.clone()),
            details: format!("Error evaluating rule: {}", reason),
            risk_score: 100,
            requires_manual_review: true,
            recommendations: vec!["Manual review required due to evaluation error".to_string()],
            metadata,
        }
    }
}

/// Evaluate a single rule. Pure: no I/O, no clock reads.
pub fn evaluate_rule(
    rule: &ComplianceRule,
    context: &EvaluationContext,
    policy: &RiskPolicy,
) -> RuleEvaluationResult {
    if rule.conditions.is_empty() {
        // An empty rule is a no-op, not a fail-closed.
        return trivial_pass(rule);
    }

    let mut outcomes: Vec<ConditionOutcome> = rule
        .conditions
        .iter()
        .map(|condition| evaluate_condition(condition, context))
        .collect();
    apply_logical_operators(&mut outcomes, rule);

    let passed = outcomes.iter().all(|outcome| outcome.passed);
    let risk_score = risk_score(rule, &outcomes, context, policy);
    let blocked = !passed && rule.action == RuleAction::Deny;
    let requires_manual_review = !passed
        && (rule.action.requests_review() || risk_score >= policy.review_threshold);

    let reason = if passed {
        None
    } else {
        Some(failure_reason(rule, &outcomes))
    };
    let details = details_text(rule, &outcomes, risk_score);
    let recommendations = rule_recommendations(rule, &outcomes);

    let mut metadata = Map::new();
    metadata.insert(
        "rulePriority".to_string(),
        Value::String(rule.priority.to_string()),
    );
    metadata.insert(
        "ruleAction".to_string(),
        Value::String(rule.action.to_string()),
    );
    metadata.insert("conditionCount".to_string(), Value::from(outcomes.len()));
    metadata.insert(
        "passedConditions".to_string(),
        Value::from(outcomes.iter().filter(|o| o.passed).count()),
    );

    RuleEvaluationResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        rule_type: rule.rule_type,
        passed,
        blocked,
        reason,
        details,
        risk_score,
        requires_manual_review,
        recommendations,
        metadata,
    }
}

fn trivial_pass(rule: &ComplianceRule) -> RuleEvaluationResult {
    let mut metadata = Map::new();
    metadata.insert(
        "rulePriority".to_string(),
        Value::String(rule.priority.to_string()),
    );
    metadata.insert(
        "ruleAction".to_string(),
        Value::String(rule.action.to_string()),
    );
    metadata.insert("conditionCount".to_string(), Value::from(0));
    RuleEvaluationResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        rule_type: rule.rule_type,
        passed: true,
        blocked: false,
        reason: None,
        details: format!("Rule: {}\nNo conditions defined", rule.name),
        risk_score: 0,
        requires_manual_review: false,
        recommendations: vec!["All conditions passed - no action required".to_string()],
        metadata,
    }
}

/// OR forces the next outcome to pass when the current one passed. The
/// forced value feeds the following link, so chains cascade.
fn apply_logical_operators(outcomes: &mut [ConditionOutcome], rule: &ComplianceRule) {
    if outcomes.len() <= 1 {
        return;
    }
    for i in 0..rule.conditions.len() - 1 {
        if rule.conditions[i].logical_operator == Some(LogicalOperator::Or) && outcomes[i].passed {
            outcomes[i + 1].passed = true;
        }
    }
}

fn risk_score(
    rule: &ComplianceRule,
    outcomes: &[ConditionOutcome],
    context: &EvaluationContext,
    policy: &RiskPolicy,
) -> u8 {
    let mut risk: f64 = match rule.rule_type {
        RuleType::Jurisdiction => 30.0,
        RuleType::InvestorType => 25.0,
        RuleType::Lockup => 40.0,
        RuleType::TransferWindow => 35.0,
        RuleType::AmountLimit => 45.0,
        RuleType::Sanctions => 90.0,
        RuleType::Aml => 70.0,
        RuleType::Pep => 60.0,
        _ => 50.0,
    };

    risk += match rule.priority {
        RulePriority::Critical => 20.0,
        RulePriority::High => 10.0,
        RulePriority::Low => -10.0,
        RulePriority::Normal => 0.0,
    };

    let failed = outcomes.iter().filter(|o| !o.passed).count();
    if !outcomes.is_empty() {
        risk += (failed as f64 / outcomes.len() as f64) * policy.failed_condition_weight;
    }

    if context.investor_type == Some(InvestorType::Individual)
        && context.accreditation_status == Some(AccreditationStatus::NonAccredited)
    {
        risk += policy.non_accredited_individual_surcharge as f64;
    }
    if let Some(jurisdiction) = &context.jurisdiction {
        if policy.is_scrutinized(jurisdiction) {
            risk += policy.scrutiny_jurisdiction_surcharge as f64;
        }
    }

    risk.round().clamp(0.0, 100.0) as u8
}

fn failure_reason(rule: &ComplianceRule, outcomes: &[ConditionOutcome]) -> String {
    let failed_fields: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.passed)
        .map(|o| o.field.as_str())
        .collect();
    format!(
        "Rule \"{}\" failed: conditions not met for fields: {}",
        rule.name,
        failed_fields.join(", ")
    )
}

fn details_text(rule: &ComplianceRule, outcomes: &[ConditionOutcome], risk_score: u8) -> String {
    let mut lines = vec![
        format!("Rule: {}", rule.name),
        format!("Type: {}", rule.rule_type),
        format!("Priority: {}", rule.priority),
    ];
    if let Some(description) = &rule.description {
        lines.push(format!("Description: {}", description));
    }
    lines.push("Condition Results:".to_string());
    for (i, outcome) in outcomes.iter().enumerate() {
        let status = if outcome.passed { "PASS" } else { "FAIL" };
        lines.push(format!(
            "{}. {} {} {} - {}",
            i + 1,
            outcome.field,
            outcome.operator,
            outcome.expected,
            status
        ));
    }
    lines.push(format!("Action: {}", rule.action));
    lines.push(format!("Risk Score: {}", risk_score));
    lines.join("\n")
}

fn rule_recommendations(rule: &ComplianceRule, outcomes: &[ConditionOutcome]) -> Vec<String> {
    if outcomes.iter().all(|o| o.passed) {
        return vec!["All conditions passed - no action required".to_string()];
    }

    let mut recommendations: Vec<String> = match rule.rule_type {
        RuleType::Jurisdiction | RuleType::GeographicRestriction => vec![
            "Verify jurisdiction compliance requirements".to_string(),
            "Check if applicant meets residency requirements".to_string(),
        ],
        RuleType::InvestorType => vec![
            "Verify investor classification".to_string(),
            "Check accreditation status if applicable".to_string(),
        ],
        RuleType::Lockup => vec![
            "Verify lockup period compliance".to_string(),
            "Check if minimum holding period is met".to_string(),
        ],
        RuleType::TransferWindow | RuleType::TimeBased => vec![
            "Verify transfer window timing".to_string(),
            "Check if current time is within allowed window".to_string(),
        ],
        RuleType::AmountLimit | RuleType::FrequencyLimit => vec![
            "Verify amount limits".to_string(),
            "Check if transfer amount is within allowed range".to_string(),
        ],
        RuleType::Sanctions => vec![
            "Immediate sanctions screening required".to_string(),
            "Block all transactions pending review".to_string(),
        ],
        RuleType::Aml => vec![
            "Enhanced due diligence required".to_string(),
            "Review source of funds".to_string(),
        ],
        RuleType::Pep => vec![
            "PEP screening required".to_string(),
            "Enhanced monitoring recommended".to_string(),
        ],
        RuleType::Custom => vec!["Review failed conditions and take appropriate action".to_string()],
    };

    if rule.priority == RulePriority::Critical {
        recommendations.insert(0, "CRITICAL: Immediate attention required".to_string());
    }
    if rule.action == RuleAction::Deny {
        recommendations.insert(0, "TRANSACTION BLOCKED: Manual review required".to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::KycApplicant;
    use crate::rule::{RuleCondition, RuleOperator, RuleStatus, ValueType};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn context() -> EvaluationContext {
        let mut applicant = KycApplicant::approved("app-1");
        applicant.accreditation_status = AccreditationStatus::Accredited;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        EvaluationContext::for_applicant(applicant, now)
    }

    fn condition(field: &str, value: &str, link: Option<LogicalOperator>) -> RuleCondition {
        RuleCondition {
            field: field.to_string(),
            operator: RuleOperator::Equals,
            value: json!(value),
            value_type: ValueType::String,
            logical_operator: link,
        }
    }

    fn rule(rule_type: RuleType, action: RuleAction, conditions: Vec<RuleCondition>) -> ComplianceRule {
        ComplianceRule {
            id: "r-1".to_string(),
            name: "Test rule".to_string(),
            description: None,
            rule_type,
            status: RuleStatus::Active,
            priority: RulePriority::Normal,
            is_active: true,
            conditions,
            action,
            action_params: None,
            effective_from: None,
            effective_until: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_rule_trivially_passes() {
        let rule = rule(RuleType::Custom, RuleAction::Deny, vec![]);
        let result = evaluate_rule(&rule, &context(), &RiskPolicy::default());
        assert!(result.passed);
        assert!(!result.blocked);
        assert!(!result.requires_manual_review);
        assert_eq!(result.risk_score, 0);
    }

    #[test]
    fn accredited_individual_rule_passes_with_baseline_risk() {
        let rule = rule(
            RuleType::InvestorType,
            RuleAction::Allow,
            vec![
                condition("investorType", "INDIVIDUAL", Some(LogicalOperator::And)),
                condition("accreditationStatus", "ACCREDITED", None),
            ],
        );
        let result = evaluate_rule(&rule, &context(), &RiskPolicy::default());
        assert!(result.passed);
        assert!(!result.blocked);
        assert!(result.risk_score <= 25);
    }

    #[test]
    fn failed_deny_rule_is_blocked() {
        let rule = rule(
            RuleType::Sanctions,
            RuleAction::Deny,
            vec![condition("applicant.riskLevel", "LOW", None)],
        );
        let result = evaluate_rule(&rule, &context(), &RiskPolicy::default());
        assert!(!result.passed);
        assert!(result.blocked);
        assert!(result.risk_score >= 90);
        assert!(result.requires_manual_review);
        assert!(result.reason.as_deref().unwrap().contains("applicant.riskLevel"));
    }

    #[test]
    fn or_forces_next_condition_to_pass() {
        // investorType == INDIVIDUAL passes, OR-links to a failing condition
        // which is forced to pass.
        let rule = rule(
            RuleType::Custom,
            RuleAction::Deny,
            vec![
                condition("investorType", "INDIVIDUAL", Some(LogicalOperator::Or)),
                condition("jurisdiction", "XX", None),
            ],
        );
        let result = evaluate_rule(&rule, &context(), &RiskPolicy::default());
        assert!(result.passed);
    }

    #[test]
    fn or_forcing_cascades_down_chains() {
        // c1 passes; OR forces c2; c2's own OR link then forces c3 because
        // the forced value participates in the next link. Pinned behavior.
        let rule = rule(
            RuleType::Custom,
            RuleAction::Deny,
            vec![
                condition("investorType", "INDIVIDUAL", Some(LogicalOperator::Or)),
                condition("jurisdiction", "XX", Some(LogicalOperator::Or)),
                condition("jurisdiction", "YY", None),
            ],
        );
        let result = evaluate_rule(&rule, &context(), &RiskPolicy::default());
        assert!(result.passed);
    }

    #[test]
    fn or_does_not_rescue_a_failing_head() {
        let rule = rule(
            RuleType::Custom,
            RuleAction::Deny,
            vec![
                condition("investorType", "CORPORATE", Some(LogicalOperator::Or)),
                condition("investorType", "INDIVIDUAL", None),
            ],
        );
        let result = evaluate_rule(&rule, &context(), &RiskPolicy::default());
        // Head failed; next passes on its own, but the head still fails the
        // rule: OR only forces forward.
        assert!(!result.passed);
    }

    #[test]
    fn risk_score_adds_context_surcharges() {
        let mut ctx = context();
        ctx.jurisdiction = Some("US".to_string());
        ctx.accreditation_status = Some(AccreditationStatus::NonAccredited);
        let rule = rule(
            RuleType::Jurisdiction,
            RuleAction::FlagForReview,
            vec![condition("jurisdiction", "DE", None)],
        );
        let result = evaluate_rule(&rule, &ctx, &RiskPolicy::default());
        // 30 base + 30 failed-condition + 15 non-accredited + 10 scrutiny.
        assert_eq!(result.risk_score, 85);
        assert!(result.requires_manual_review);
    }

    #[test]
    fn risk_score_clamps_to_100() {
        let mut ctx = context();
        ctx.jurisdiction = Some("US".to_string());
        let mut r = rule(
            RuleType::Sanctions,
            RuleAction::Deny,
            vec![condition("jurisdiction", "DE", None)],
        );
        r.priority = RulePriority::Critical;
        let result = evaluate_rule(&r, &ctx, &RiskPolicy::default());
        assert_eq!(result.risk_score, 100);
    }

    #[test]
    fn evaluation_error_fails_closed() {
        let rule = rule(RuleType::Custom, RuleAction::Allow, vec![]);
        let result = RuleEvaluationResult::evaluation_error(&rule, "bad definition");
        assert!(!result.passed);
        assert!(result.blocked);
        assert_eq!(result.risk_score, 100);
        assert!(result.requires_manual_review);
    }
}
