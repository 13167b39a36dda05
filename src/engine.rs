//! Compliance engine: runs the ordered rule set and aggregates a verdict.
//!
//! Every effective rule is evaluated; there is no short-circuiting across
//! rules, so the audit trail always sees the full picture. Aggregation is
//! deterministic: for a fixed rule set and context (including its injected
//! timestamp) repeated runs produce identical verdicts.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::evaluator::{evaluate_rule, RuleEvaluationResult};
use crate::store::RuleStore;

/// Aggregate result over all rule evaluations for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallResult {
    Pass,
    Fail,
    ReviewRequired,
}

impl OverallResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallResult::Pass => "PASS",
            OverallResult::Fail => "FAIL",
            OverallResult::ReviewRequired => "REVIEW_REQUIRED",
        }
    }
}

impl Display for OverallResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The verdict for one engine run. Ephemeral: recomputed on every check and
/// never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub overall_result: OverallResult,
    pub passed_rules: usize,
    pub failed_rules: usize,
    pub blocked_rules: usize,
    pub total_risk_score: u32,
    pub average_risk_score: f64,
    /// The failing result with the highest risk score, if any rule failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_risk_rule: Option<RuleEvaluationResult>,
    pub evaluation_results: Vec<RuleEvaluationResult>,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub requires_manual_review: bool,
    pub can_proceed: bool,
    /// True when no effective rules existed and the verdict is the
    /// fail-open default.
    pub degenerate: bool,
}

impl ComplianceVerdict {
    /// Default PASS verdict for an unconfigured rule set. Fail-open by
    /// design: an empty policy must not block all traffic.
    fn default_pass() -> Self {
        Self {
            overall_result: OverallResult::Pass,
            passed_rules: 0,
            failed_rules: 0,
            blocked_rules: 0,
            total_risk_score: 0,
            average_risk_score: 0.0,
            highest_risk_rule: None,
            evaluation_results: Vec::new(),
            summary: "No active compliance rules found - default pass".to_string(),
            recommendations: vec![
                "No compliance rules configured - consider setting up rules".to_string(),
            ],
            requires_manual_review: false,
            can_proceed: true,
            degenerate: true,
        }
    }
}

/// Runs the effective rule set against evaluation contexts.
#[derive(Clone)]
pub struct ComplianceEngine {
    rules: Arc<dyn RuleStore>,
    config: Arc<Config>,
}

impl ComplianceEngine {
    pub fn new(rules: Arc<dyn RuleStore>, config: Arc<Config>) -> Self {
        Self { rules, config }
    }

    /// Evaluate all effective rules against `context` and aggregate the
    /// verdict. Rules are fetched ordered by ascending priority weight, then
    /// creation time; ordering governs evaluation order only, since every
    /// rule always runs.
    pub async fn evaluate(&self, context: &EvaluationContext) -> Result<ComplianceVerdict> {
        info!(
            applicant_id = %context.applicant.id,
            "Evaluating compliance rules"
        );

        let rules = self.rules.effective_rules(context.timestamp).await?;
        if rules.is_empty() {
            warn!("No active compliance rules found");
            return Ok(ComplianceVerdict::default_pass());
        }

        let mut evaluation_results = Vec::with_capacity(rules.len());
        for rule in &rules {
            // A structurally invalid rule must never silently pass.
            let result = match rule.validate() {
                Ok(()) => evaluate_rule(rule, context, &self.config.risk),
                Err(e) => RuleEvaluationResult::evaluation_error(rule, e.to_string()),
            };
            evaluation_results.push(result);
        }

        let verdict = aggregate(evaluation_results);
        info!(
            overall = %verdict.overall_result,
            passed = verdict.passed_rules,
            total = rules.len(),
            "Compliance evaluation completed"
        );
        Ok(verdict)
    }
}

fn aggregate(evaluation_results: Vec<RuleEvaluationResult>) -> ComplianceVerdict {
    let passed_rules = evaluation_results.iter().filter(|r| r.passed).count();
    let failed_rules = evaluation_results.len() - passed_rules;
    let blocked_rules = evaluation_results.iter().filter(|r| r.blocked).count();
    let total_risk_score: u32 = evaluation_results
        .iter()
        .map(|r| r.risk_score as u32)
        .sum();
    let average_risk_score = total_risk_score as f64 / evaluation_results.len() as f64;

    // First failing result with the maximum risk score.
    let mut highest_risk_rule: Option<&RuleEvaluationResult> = None;
    for result in evaluation_results.iter().filter(|r| !r.passed) {
        if highest_risk_rule.map_or(true, |best| result.risk_score > best.risk_score) {
            highest_risk_rule = Some(result);
        }
    }
    let highest_risk_rule = highest_risk_rule.cloned();

    let requires_manual_review = evaluation_results.iter().any(|r| r.requires_manual_review);
    let overall_result = if blocked_rules > 0 {
        OverallResult::Fail
    } else if failed_rules > 0 || requires_manual_review {
        OverallResult::ReviewRequired
    } else {
        OverallResult::Pass
    };
    let can_proceed = overall_result == OverallResult::Pass
        || (overall_result == OverallResult::ReviewRequired && blocked_rules == 0);

    let summary = summary_text(
        &evaluation_results,
        overall_result,
        blocked_rules,
        requires_manual_review,
    );
    let recommendations = verdict_recommendations(&evaluation_results, overall_result);

    ComplianceVerdict {
        overall_result,
        passed_rules,
        failed_rules,
        blocked_rules,
        total_risk_score,
        average_risk_score,
        highest_risk_rule,
        evaluation_results,
        summary,
        recommendations,
        requires_manual_review,
        can_proceed,
        degenerate: false,
    }
}

fn summary_text(
    results: &[RuleEvaluationResult],
    overall: OverallResult,
    blocked_rules: usize,
    requires_manual_review: bool,
) -> String {
    let mut lines = vec![
        format!("Compliance check completed: {}", overall),
        format!("Rules evaluated: {}", results.len()),
        format!("Rules passed: {}", results.iter().filter(|r| r.passed).count()),
        format!("Rules failed: {}", results.iter().filter(|r| !r.passed).count()),
    ];
    if blocked_rules > 0 {
        lines.push(format!("Rules blocked: {}", blocked_rules));
    }
    if overall == OverallResult::ReviewRequired && requires_manual_review {
        lines.push("Manual review required for some rules".to_string());
    }
    lines.join("\n")
}

fn verdict_recommendations(
    results: &[RuleEvaluationResult],
    overall: OverallResult,
) -> Vec<String> {
    match overall {
        OverallResult::Pass => {
            vec!["All compliance requirements met - proceed with transaction".to_string()]
        }
        OverallResult::Fail => vec![
            "CRITICAL: Transaction blocked - immediate review required".to_string(),
            "Contact compliance team for urgent review".to_string(),
        ],
        OverallResult::ReviewRequired => {
            let mut recommendations =
                vec!["Manual review required before proceeding".to_string()];
            for result in results.iter().filter(|r| !r.passed) {
                if result.risk_score >= 70 || result.blocked {
                    recommendations.push(format!(
                        "High-risk rule \"{}\" requires immediate attention (risk {})",
                        result.rule_name, result.risk_score
                    ));
                }
            }
            recommendations.push("Review all failed rules and take appropriate action".to_string());
            recommendations.push("Consider additional due diligence if required".to_string());
            recommendations
        }
    }
}
