//! Evaluation context: the read-only view rules are scored against.
//!
//! Rather than reflecting over arbitrary nested structures, the context is a
//! closed set of named fields plus a string-keyed metadata bag. Condition
//! field paths resolve against the named fields first (including the
//! `applicant.*` sub-fields); any other path walks the metadata bag. An
//! unresolvable path yields `None`, which the operators treat as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kyc::{AccreditationStatus, InvestorType, KycApplicant};

/// Immutable snapshot evaluated by the rule engine.
///
/// `timestamp` is the injected `now` for the whole evaluation; nothing in
/// the core reads the wall clock, so repeated evaluations of the same
/// context are byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    pub applicant: KycApplicant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investor_type: Option<InvestorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accreditation_status: Option<AccreditationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockup_period_days: Option<u32>,
    pub timestamp: DateTime<Utc>,
    /// Extensibility bag for custom rule fields. Dotted paths beyond the
    /// named fields resolve here by walking JSON objects.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl EvaluationContext {
    /// Context for a bare applicant check (no transfer bound in).
    pub fn for_applicant(applicant: KycApplicant, now: DateTime<Utc>) -> Self {
        let jurisdiction = applicant.jurisdiction.clone();
        let investor_type = Some(applicant.investor_type);
        let accreditation_status = Some(applicant.accreditation_status);
        Self {
            applicant,
            transfer_amount: None,
            asset_id: None,
            from_address: None,
            to_address: None,
            jurisdiction,
            investor_type,
            accreditation_status,
            lockup_period_days: None,
            timestamp: now,
            metadata: Map::new(),
        }
    }

    /// Resolve a dot-separated field path to a JSON value.
    ///
    /// Returns `None` for unresolvable paths, including trailing segments
    /// past a scalar field.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let scalar = |value: Option<Value>| -> Option<Value> {
            // A scalar named field has no sub-paths.
            if rest.is_empty() { value } else { None }
        };

        match head {
            "applicant" => self.resolve_applicant(&rest),
            "transferAmount" => scalar(self.transfer_amount.map(number)),
            "assetId" => scalar(self.asset_id.clone().map(Value::String)),
            "fromAddress" => scalar(self.from_address.clone().map(Value::String)),
            "toAddress" => scalar(self.to_address.clone().map(Value::String)),
            "jurisdiction" => scalar(self.jurisdiction.clone().map(Value::String)),
            "investorType" => scalar(self.investor_type.map(|v| str_value(v.as_str()))),
            "accreditationStatus" => {
                scalar(self.accreditation_status.map(|v| str_value(v.as_str())))
            }
            "lockupPeriodDays" => scalar(self.lockup_period_days.map(|v| Value::from(v))),
            "timestamp" => scalar(Some(Value::String(self.timestamp.to_rfc3339()))),
            other => walk(self.metadata.get(other)?, &rest),
        }
    }

    fn resolve_applicant(&self, rest: &[&str]) -> Option<Value> {
        let a = &self.applicant;
        match rest {
            [] => serde_json::to_value(a).ok(),
            ["id"] => Some(Value::String(a.id.clone())),
            ["walletAddress"] => a.wallet_address.clone().map(Value::String),
            ["investorType"] => Some(str_value(a.investor_type.as_str())),
            ["accreditationStatus"] => Some(str_value(a.accreditation_status.as_str())),
            ["status"] => Some(str_value(a.status.as_str())),
            ["riskLevel"] => Some(str_value(a.risk_level.as_str())),
            ["jurisdiction"] => a.jurisdiction.clone().map(Value::String),
            ["isPep"] => Some(Value::Bool(a.is_pep)),
            ["isSanctioned"] => Some(Value::Bool(a.is_sanctioned)),
            ["isBlocked"] => Some(Value::Bool(a.is_blocked)),
            ["annualIncome"] => a.annual_income.map(number),
            ["netWorth"] => a.net_worth.map(number),
            _ => None,
        }
    }
}

fn str_value(s: &str) -> Value {
    Value::String(s.to_string())
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn walk(start: &Value, rest: &[&str]) -> Option<Value> {
    let mut current = start;
    for segment in rest {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> EvaluationContext {
        let mut applicant = KycApplicant::approved("app-1");
        applicant.jurisdiction = Some("US".to_string());
        applicant.accreditation_status = AccreditationStatus::Accredited;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut ctx = EvaluationContext::for_applicant(applicant, now);
        ctx.transfer_amount = Some(50_000.0);
        ctx.metadata.insert(
            "holding".to_string(),
            serde_json::json!({ "asset": { "class": "equity" } }),
        );
        ctx
    }

    #[test]
    fn resolves_named_fields() {
        let ctx = context();
        assert_eq!(
            ctx.resolve("investorType"),
            Some(Value::String("INDIVIDUAL".to_string()))
        );
        assert_eq!(ctx.resolve("transferAmount"), Some(Value::from(50_000.0)));
        assert_eq!(
            ctx.resolve("applicant.riskLevel"),
            Some(Value::String("MEDIUM".to_string()))
        );
        assert_eq!(ctx.resolve("applicant.isPep"), Some(Value::Bool(false)));
    }

    #[test]
    fn resolves_metadata_paths() {
        let ctx = context();
        assert_eq!(
            ctx.resolve("holding.asset.class"),
            Some(Value::String("equity".to_string()))
        );
    }

    #[test]
    fn unresolvable_paths_are_absent() {
        let ctx = context();
        assert_eq!(ctx.resolve("nonexistent"), None);
        assert_eq!(ctx.resolve("holding.asset.missing"), None);
        // Scalar fields have no sub-paths.
        assert_eq!(ctx.resolve("transferAmount.currency"), None);
        assert_eq!(ctx.resolve("applicant.shoeSize"), None);
    }
}
