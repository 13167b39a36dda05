//! Crate configuration.
//!
//! Everything here defaults to the documented policy constants; a TOML file
//! can override the tunables (risk heuristics, gate weights, audit logging)
//! without touching code. Timing tables for cases are policy, not tuning,
//! and live in [`crate::case`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{ComplianceError, Result};

/// Jurisdictions under elevated regulatory scrutiny. Contexts resolving to
/// one of these take a risk surcharge during rule scoring.
pub static HIGH_SCRUTINY_JURISDICTIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["US", "CA", "GB"]));

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub risk: RiskPolicy,
    pub gate: GateWeights,
    pub audit: AuditConfig,
}

/// Tunables of the per-rule risk score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Failed rules at or above this score require manual review.
    pub review_threshold: u8,
    /// Overrides [`HIGH_SCRUTINY_JURISDICTIONS`] when non-empty.
    pub scrutiny_jurisdictions: Vec<String>,
    /// Surcharge for non-accredited individual investors.
    pub non_accredited_individual_surcharge: i32,
    /// Surcharge for contexts in a high-scrutiny jurisdiction.
    pub scrutiny_jurisdiction_surcharge: i32,
    /// Weight of the failed-condition ratio term.
    pub failed_condition_weight: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            review_threshold: 70,
            scrutiny_jurisdictions: Vec::new(),
            non_accredited_individual_surcharge: 15,
            scrutiny_jurisdiction_surcharge: 10,
            failed_condition_weight: 30.0,
        }
    }
}

impl RiskPolicy {
    pub fn is_scrutinized(&self, jurisdiction: &str) -> bool {
        if self.scrutiny_jurisdictions.is_empty() {
            HIGH_SCRUTINY_JURISDICTIONS.contains(jurisdiction)
        } else {
            self.scrutiny_jurisdictions.iter().any(|j| j == jurisdiction)
        }
    }
}

/// Weights of the three transfer-gate stages in the blended score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateWeights {
    pub kyc: f64,
    pub rules: f64,
    pub screening: f64,
}

impl Default for GateWeights {
    fn default() -> Self {
        Self {
            kyc: 0.3,
            rules: 0.4,
            screening: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Tracing target the audit trail is written under.
    pub target: String,
    pub format: LogFormat,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: "compliance_audit".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl Config {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ComplianceError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        toml::from_str(&content).map_err(ComplianceError::Toml)
    }

    /// Load from the default locations, falling back to defaults when no
    /// config file exists.
    pub fn from_env() -> Result<Self> {
        let default_paths = [
            "config/compliance.toml",
            "compliance.toml",
            ".compliance.toml",
        ];
        for path in &default_paths {
            if std::path::Path::new(path).exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.risk.review_threshold, 70);
        assert!(config.risk.is_scrutinized("US"));
        assert!(config.risk.is_scrutinized("GB"));
        assert!(!config.risk.is_scrutinized("DE"));
        assert_eq!(config.gate.kyc, 0.3);
        assert_eq!(config.gate.rules, 0.4);
        assert_eq!(config.gate.screening, 0.3);
    }

    #[test]
    fn toml_overrides() {
        let toml = r#"
            [risk]
            review_threshold = 80
            scrutiny_jurisdictions = ["US"]

            [audit]
            format = "text"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.risk.review_threshold, 80);
        assert!(config.risk.is_scrutinized("US"));
        assert!(!config.risk.is_scrutinized("GB"));
        assert_eq!(config.audit.format, LogFormat::Text);
        // Untouched sections keep their defaults.
        assert_eq!(config.gate.rules, 0.4);
    }
}
