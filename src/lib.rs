//! KYC/AML compliance core for tokenized-asset platforms.
//!
//! Data-driven compliance rules are evaluated against typed contexts by the
//! [`engine::ComplianceEngine`]; manual review flows through the
//! [`workflow::CaseWorkflow`] state machine; token transfers are guarded by
//! the [`transfer::TransferGate`]. Persistence, KYC and screening lookups,
//! and the audit trail sit behind traits in [`store`] and [`audit`], with
//! in-memory implementations for tests and embeddings.

pub mod audit;
pub mod case;
pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod kyc;
pub mod rule;
pub mod screening;
pub mod store;
pub mod transfer;
pub mod workflow;

// Re-export main types for convenience
pub use audit::{AuditAction, AuditLevel, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use case::{
    CasePriority, CaseStatus, CaseTransition, CaseType, ComplianceCase, DecisionType,
    EscalationRecord,
};
pub use condition::{evaluate_condition, ConditionOutcome};
pub use config::{AuditConfig, Config, GateWeights, LogFormat, RiskPolicy};
pub use context::EvaluationContext;
pub use engine::{ComplianceEngine, ComplianceVerdict, OverallResult};
pub use error::{ComplianceError, Result};
pub use evaluator::{evaluate_rule, RuleEvaluationResult};
pub use kyc::{AccreditationStatus, InvestorType, KycApplicant, KycStatus, RiskLevel};
pub use rule::{
    ComplianceRule, LogicalOperator, RuleAction, RuleCondition, RuleOperator, RulePriority,
    RuleStatus, RuleType, ValueType,
};
pub use screening::{ScreeningFinding, ScreeningOutcome, ScreeningResult, ScreeningType};
pub use store::{
    CaseStore, KycStore, MemoryCaseStore, MemoryKycStore, MemoryRuleStore,
    MemoryScreeningProvider, RuleStore, ScreeningProvider,
};
pub use transfer::{
    TransferCheckRequest, TransferCheckResult, TransferGate, TransferRestrictions,
};
pub use workflow::{
    AssignCaseRequest, CaseWorkflow, CreateCaseRequest, DecideCaseRequest, EscalateCaseRequest,
};
