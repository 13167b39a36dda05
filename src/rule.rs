//! Compliance rule data model.
//!
//! A rule is a named, versioned policy unit: an ordered list of typed
//! conditions plus the action to take when the rule fails. Rules are
//! authored as data (JSON) and validated at the deserialization boundary so
//! that illegal operator/action values are unrepresentable inside the
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

use crate::error::{ComplianceError, Result};

/// Policy domain a rule belongs to. Drives the base risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Jurisdiction,
    InvestorType,
    Lockup,
    TransferWindow,
    AmountLimit,
    FrequencyLimit,
    GeographicRestriction,
    TimeBased,
    Sanctions,
    Aml,
    Pep,
    Custom,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Jurisdiction => "JURISDICTION",
            RuleType::InvestorType => "INVESTOR_TYPE",
            RuleType::Lockup => "LOCKUP",
            RuleType::TransferWindow => "TRANSFER_WINDOW",
            RuleType::AmountLimit => "AMOUNT_LIMIT",
            RuleType::FrequencyLimit => "FREQUENCY_LIMIT",
            RuleType::GeographicRestriction => "GEOGRAPHIC_RESTRICTION",
            RuleType::TimeBased => "TIME_BASED",
            RuleType::Sanctions => "SANCTIONS",
            RuleType::Aml => "AML",
            RuleType::Pep => "PEP",
            RuleType::Custom => "CUSTOM",
        }
    }
}

impl Display for RuleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Draft,
    Active,
    Inactive,
    Archived,
}

/// Rule priority. The numeric weight is the evaluation-order key: lower
/// weights run first. It also nudges the per-rule risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePriority {
    Low,
    Normal,
    High,
    Critical,
}

impl RulePriority {
    pub fn weight(&self) -> u32 {
        match self {
            RulePriority::Low => 1,
            RulePriority::Normal => 5,
            RulePriority::High => 10,
            RulePriority::Critical => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RulePriority::Low => "LOW",
            RulePriority::Normal => "NORMAL",
            RulePriority::High => "HIGH",
            RulePriority::Critical => "CRITICAL",
        }
    }
}

impl Display for RulePriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    NotContains,
    In,
    NotIn,
    Between,
    NotBetween,
    Regex,
    Exists,
    NotExists,
    StartsWith,
    EndsWith,
}

impl RuleOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOperator::Equals => "EQUALS",
            RuleOperator::NotEquals => "NOT_EQUALS",
            RuleOperator::GreaterThan => "GREATER_THAN",
            RuleOperator::LessThan => "LESS_THAN",
            RuleOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            RuleOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            RuleOperator::Contains => "CONTAINS",
            RuleOperator::NotContains => "NOT_CONTAINS",
            RuleOperator::In => "IN",
            RuleOperator::NotIn => "NOT_IN",
            RuleOperator::Between => "BETWEEN",
            RuleOperator::NotBetween => "NOT_BETWEEN",
            RuleOperator::Regex => "REGEX",
            RuleOperator::Exists => "EXISTS",
            RuleOperator::NotExists => "NOT_EXISTS",
            RuleOperator::StartsWith => "STARTS_WITH",
            RuleOperator::EndsWith => "ENDS_WITH",
        }
    }
}

impl Display for RuleOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens when the rule fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    Allow,
    Deny,
    RequireApproval,
    FlagForReview,
    ApplyRestrictions,
    LogOnly,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "ALLOW",
            RuleAction::Deny => "DENY",
            RuleAction::RequireApproval => "REQUIRE_APPROVAL",
            RuleAction::FlagForReview => "FLAG_FOR_REVIEW",
            RuleAction::ApplyRestrictions => "APPLY_RESTRICTIONS",
            RuleAction::LogOnly => "LOG_ONLY",
        }
    }

    /// Actions that route a failed rule to a human.
    pub fn requests_review(&self) -> bool {
        matches!(self, RuleAction::RequireApproval | RuleAction::FlagForReview)
    }
}

impl Display for RuleAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared type of a condition literal. The literal is coerced to this type
/// before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

/// How a condition relates to the *next* condition in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// A single predicate inside a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// Dot-separated path resolved against the evaluation context.
    pub field: String,
    pub operator: RuleOperator,
    /// Literal to compare against, coerced per `value_type`.
    pub value: Value,
    pub value_type: ValueType,
    /// Link to the next condition; `None` means AND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

/// A named, versioned compliance policy unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rule_type: RuleType,
    pub status: RuleStatus,
    pub priority: RulePriority,
    pub is_active: bool,
    pub conditions: Vec<RuleCondition>,
    pub action: RuleAction,
    /// Optional action parameters (e.g. restriction bounds for
    /// `APPLY_RESTRICTIONS`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_params: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ComplianceRule {
    /// A rule participates in evaluation iff it is active, in ACTIVE status,
    /// and `now` falls within its effectivity window.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.status == RuleStatus::Active
            && self.effective_from.map_or(true, |from| from <= now)
            && self.effective_until.map_or(true, |until| now <= until)
    }

    /// Structural validation, applied at the deserialization boundary and
    /// re-checked by the engine before evaluation. A rule failing this check
    /// is never silently passed: the engine emits a fail-closed result for
    /// it.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ComplianceError::InvalidRule(
                "rule name must not be empty".to_string(),
            ));
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if condition.field.trim().is_empty() {
                return Err(ComplianceError::InvalidRule(format!(
                    "condition {} of rule '{}' has an empty field path",
                    i, self.name
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a rule from its JSON representation.
    pub fn from_json(value: Value) -> Result<Self> {
        let rule: ComplianceRule = serde_json::from_value(value)?;
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minimal_rule() -> ComplianceRule {
        ComplianceRule {
            id: "r-1".to_string(),
            name: "Test rule".to_string(),
            description: None,
            rule_type: RuleType::Custom,
            status: RuleStatus::Active,
            priority: RulePriority::Normal,
            is_active: true,
            conditions: vec![],
            action: RuleAction::Allow,
            action_params: None,
            effective_from: None,
            effective_until: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn effective_requires_active_flag_and_status() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let rule = minimal_rule();
        assert!(rule.is_effective(now));

        let mut inactive = rule.clone();
        inactive.is_active = false;
        assert!(!inactive.is_effective(now));

        let mut draft = rule.clone();
        draft.status = RuleStatus::Draft;
        assert!(!draft.is_effective(now));
    }

    #[test]
    fn effective_window_is_inclusive() {
        let from = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let mut rule = minimal_rule();
        rule.effective_from = Some(from);
        rule.effective_until = Some(until);

        assert!(rule.is_effective(from));
        assert!(rule.is_effective(until));
        assert!(!rule.is_effective(from - chrono::Duration::seconds(1)));
        assert!(!rule.is_effective(until + chrono::Duration::seconds(1)));
    }

    #[test]
    fn validate_rejects_empty_name() {
        let mut rule = minimal_rule();
        rule.name = "  ".to_string();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn from_json_round_trip_uses_wire_names() {
        let json = serde_json::json!({
            "id": "r-42",
            "name": "US accredited only",
            "ruleType": "INVESTOR_TYPE",
            "status": "ACTIVE",
            "priority": "HIGH",
            "isActive": true,
            "conditions": [{
                "field": "investorType",
                "operator": "EQUALS",
                "value": "INDIVIDUAL",
                "valueType": "string",
                "logicalOperator": "AND"
            }],
            "action": "REQUIRE_APPROVAL",
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let rule = ComplianceRule::from_json(json).unwrap();
        assert_eq!(rule.rule_type, RuleType::InvestorType);
        assert_eq!(rule.priority.weight(), 10);
        assert_eq!(rule.conditions[0].operator, RuleOperator::Equals);
        assert_eq!(
            rule.conditions[0].logical_operator,
            Some(LogicalOperator::And)
        );
    }
}
