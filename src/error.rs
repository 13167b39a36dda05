use thiserror::Error;

use crate::case::{CaseStatus, CaseTransition};

/// Crate-level error taxonomy.
///
/// Validation problems inside rule evaluation never surface here: malformed
/// conditions fail closed at the condition level (`passed = false`) instead
/// of propagating. These variants cover the cases every caller must handle
/// explicitly: missing entities, rejected state transitions, and collaborator
/// failures.
#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Compliance case not found: {0}")]
    CaseNotFound(String),

    #[error("Applicant not found: {0}")]
    ApplicantNotFound(String),

    #[error("Invalid case transition: cannot {action} case in status {from}")]
    InvalidTransition {
        from: CaseStatus,
        action: CaseTransition,
    },

    #[error("Invalid rule definition: {0}")]
    InvalidRule(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Screening provider error: {0}")]
    Screening(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ComplianceError>;
