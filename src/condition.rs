//! Condition evaluator: one typed predicate against one context.
//!
//! Pure function of its two inputs. Malformed inputs (unparsable regex,
//! bad BETWEEN bounds, non-numeric operands to numeric operators) fail
//! closed: the condition evaluates to `passed = false`, never to an error.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;

use crate::context::EvaluationContext;
use crate::rule::{RuleCondition, RuleOperator, ValueType};

/// Outcome of evaluating a single condition.
#[derive(Debug, Clone)]
pub struct ConditionOutcome {
    pub field: String,
    pub operator: RuleOperator,
    pub passed: bool,
    /// Value resolved from the context; `None` when the path was absent.
    pub actual: Option<Value>,
    /// Condition literal after type coercion.
    pub expected: Value,
}

/// Evaluate one condition against a context.
pub fn evaluate_condition(
    condition: &RuleCondition,
    context: &EvaluationContext,
) -> ConditionOutcome {
    let actual = context.resolve(&condition.field);
    let expected = coerce(&condition.value, condition.value_type);
    let passed = apply_operator(
        actual.as_ref(),
        condition.operator,
        &expected,
        condition.value_type,
    );
    ConditionOutcome {
        field: condition.field.clone(),
        operator: condition.operator,
        passed,
        actual,
        expected,
    }
}

/// Coerce a condition literal to its declared type.
fn coerce(value: &Value, value_type: ValueType) -> Value {
    match value_type {
        ValueType::String => Value::String(stringify(value)),
        // Unparsable numbers coerce to Null, the NaN stand-in: every
        // numeric comparison against it is false.
        ValueType::Number => numeric(value).map_or(Value::Null, float_value),
        ValueType::Boolean => Value::Bool(truthy(value)),
        ValueType::Date => date_millis(value).map_or(Value::Null, float_value),
        ValueType::Array => match value {
            Value::Array(_) => value.clone(),
            other => Value::Array(vec![other.clone()]),
        },
        ValueType::Object => match value {
            Value::Object(_) => value.clone(),
            other => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert("value".to_string(), other.clone());
                Value::Object(wrapped)
            }
        },
    }
}

fn apply_operator(
    actual: Option<&Value>,
    operator: RuleOperator,
    expected: &Value,
    value_type: ValueType,
) -> bool {
    match operator {
        RuleOperator::Equals => actual.is_some_and(|a| values_equal(a, expected)),
        RuleOperator::NotEquals => !actual.is_some_and(|a| values_equal(a, expected)),
        RuleOperator::GreaterThan => compare(actual, expected, value_type, |a, e| a > e),
        RuleOperator::LessThan => compare(actual, expected, value_type, |a, e| a < e),
        RuleOperator::GreaterThanOrEqual => compare(actual, expected, value_type, |a, e| a >= e),
        RuleOperator::LessThanOrEqual => compare(actual, expected, value_type, |a, e| a <= e),
        RuleOperator::Contains => {
            actual.is_some_and(|a| stringify(a).contains(&stringify(expected)))
        }
        RuleOperator::NotContains => {
            !actual.is_some_and(|a| stringify(a).contains(&stringify(expected)))
        }
        RuleOperator::In => match expected {
            Value::Array(items) => {
                actual.is_some_and(|a| items.iter().any(|item| values_equal(a, item)))
            }
            _ => false,
        },
        RuleOperator::NotIn => match expected {
            Value::Array(items) => {
                !actual.is_some_and(|a| items.iter().any(|item| values_equal(a, item)))
            }
            _ => false,
        },
        RuleOperator::Between => match bounds(expected) {
            Some((min, max)) => {
                comparable(actual, value_type).is_some_and(|a| a >= min && a <= max)
            }
            None => false,
        },
        RuleOperator::NotBetween => match bounds(expected) {
            Some((min, max)) => comparable(actual, value_type).is_some_and(|a| a < min || a > max),
            None => false,
        },
        RuleOperator::Regex => match expected.as_str().map(Regex::new) {
            Some(Ok(regex)) => actual.is_some_and(|a| regex.is_match(&stringify(a))),
            // Invalid or non-string pattern fails closed.
            _ => false,
        },
        RuleOperator::Exists => actual.is_some_and(|a| !a.is_null()),
        RuleOperator::NotExists => !actual.is_some_and(|a| !a.is_null()),
        RuleOperator::StartsWith => {
            actual.is_some_and(|a| stringify(a).starts_with(&stringify(expected)))
        }
        RuleOperator::EndsWith => {
            actual.is_some_and(|a| stringify(a).ends_with(&stringify(expected)))
        }
    }
}

fn compare(
    actual: Option<&Value>,
    expected: &Value,
    value_type: ValueType,
    op: fn(f64, f64) -> bool,
) -> bool {
    match (comparable(actual, value_type), numeric(expected)) {
        (Some(a), Some(e)) => op(a, e),
        // NaN on either side compares false.
        _ => false,
    }
}

/// Numeric view of the actual value. Date-typed conditions parse timestamps;
/// everything else uses plain numeric coercion.
fn comparable(actual: Option<&Value>, value_type: ValueType) -> Option<f64> {
    let value = actual?;
    match value_type {
        ValueType::Date => date_millis(value),
        _ => numeric(value),
    }
}

/// JS-style numeric cast. `None` stands in for NaN.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Parse a value as a timestamp in epoch milliseconds.
fn date_millis(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.timestamp_millis() as f64);
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
                return Some(dt.timestamp_millis() as f64);
            }
            None
        }
        _ => None,
    }
}

/// JS-style truthiness.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Values are equal when they are the same JSON shape; numbers compare by
/// their f64 value so `5` and `5.0` match.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Extract `[min, max]` bounds; anything else is malformed and fails closed.
fn bounds(expected: &Value) -> Option<(f64, f64)> {
    match expected {
        Value::Array(items) if items.len() == 2 => {
            Some((numeric(&items[0])?, numeric(&items[1])?))
        }
        _ => None,
    }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::KycApplicant;
    use chrono::TimeZone;

    fn ctx() -> EvaluationContext {
        let mut applicant = KycApplicant::approved("app-1");
        applicant.jurisdiction = Some("DE".to_string());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut ctx = EvaluationContext::for_applicant(applicant, now);
        ctx.transfer_amount = Some(25_000.0);
        ctx
    }

    fn condition(field: &str, operator: RuleOperator, value: Value, vt: ValueType) -> RuleCondition {
        RuleCondition {
            field: field.to_string(),
            operator,
            value,
            value_type: vt,
            logical_operator: None,
        }
    }

    #[test]
    fn equals_is_strict_across_types() {
        let c = condition(
            "investorType",
            RuleOperator::Equals,
            Value::String("INDIVIDUAL".to_string()),
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        // "25000" (string) does not strictly equal 25000 (number).
        let c = condition(
            "transferAmount",
            RuleOperator::Equals,
            Value::String("25000".to_string()),
            ValueType::String,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn numeric_comparisons() {
        let c = condition(
            "transferAmount",
            RuleOperator::GreaterThan,
            serde_json::json!(10_000),
            ValueType::Number,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "transferAmount",
            RuleOperator::LessThanOrEqual,
            serde_json::json!("25000"),
            ValueType::Number,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn nan_comparisons_are_false() {
        let c = condition(
            "jurisdiction",
            RuleOperator::GreaterThan,
            serde_json::json!(10),
            ValueType::Number,
        );
        // Number("DE") is NaN.
        assert!(!evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn between_requires_two_bounds() {
        let c = condition(
            "transferAmount",
            RuleOperator::Between,
            serde_json::json!([10_000, 50_000]),
            ValueType::Array,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        // Malformed bounds fail closed.
        let c = condition(
            "transferAmount",
            RuleOperator::Between,
            serde_json::json!([10_000]),
            ValueType::Array,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "transferAmount",
            RuleOperator::NotBetween,
            serde_json::json!("not-an-array"),
            ValueType::Array,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn not_between_outside_bounds() {
        let c = condition(
            "transferAmount",
            RuleOperator::NotBetween,
            serde_json::json!([30_000, 50_000]),
            ValueType::Array,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn invalid_regex_fails_closed() {
        let c = condition(
            "jurisdiction",
            RuleOperator::Regex,
            Value::String("[unclosed".to_string()),
            ValueType::String,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "jurisdiction",
            RuleOperator::Regex,
            Value::String("^D[EK]$".to_string()),
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn exists_tests_presence() {
        let c = condition(
            "assetId",
            RuleOperator::Exists,
            Value::Null,
            ValueType::String,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "transferAmount",
            RuleOperator::Exists,
            Value::Null,
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "assetId",
            RuleOperator::NotExists,
            Value::Null,
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn in_and_not_in() {
        let c = condition(
            "jurisdiction",
            RuleOperator::In,
            serde_json::json!(["DE", "FR"]),
            ValueType::Array,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "jurisdiction",
            RuleOperator::NotIn,
            serde_json::json!(["US", "CA"]),
            ValueType::Array,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        // Scalar literal declared as array gets wrapped before comparison.
        let c = condition(
            "jurisdiction",
            RuleOperator::In,
            Value::String("DE".to_string()),
            ValueType::Array,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn string_edges() {
        let c = condition(
            "jurisdiction",
            RuleOperator::StartsWith,
            Value::String("D".to_string()),
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "jurisdiction",
            RuleOperator::EndsWith,
            Value::String("E".to_string()),
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "jurisdiction",
            RuleOperator::Contains,
            Value::String("X".to_string()),
            ValueType::String,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn date_comparisons_parse_timestamps() {
        let c = condition(
            "timestamp",
            RuleOperator::GreaterThan,
            Value::String("2024-01-01".to_string()),
            ValueType::Date,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "timestamp",
            RuleOperator::LessThan,
            Value::String("2024-01-01T00:00:00Z".to_string()),
            ValueType::Date,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);
    }

    #[test]
    fn absent_field_semantics() {
        // Absent actual: EQUALS false, NOT_EQUALS true, NOT_CONTAINS true.
        let c = condition(
            "missingField",
            RuleOperator::Equals,
            Value::String("x".to_string()),
            ValueType::String,
        );
        assert!(!evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "missingField",
            RuleOperator::NotEquals,
            Value::String("x".to_string()),
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);

        let c = condition(
            "missingField",
            RuleOperator::NotContains,
            Value::String("x".to_string()),
            ValueType::String,
        );
        assert!(evaluate_condition(&c, &ctx()).passed);
    }
}
