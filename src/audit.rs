//! Audit trail emission.
//!
//! Every state-mutating workflow transition emits one audit record carrying
//! the old and new values of the mutated fields. The sink is fire-and-forget
//! from the core's perspective; the tracing-backed sink never fails the
//! triggering operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

use crate::config::{AuditConfig, LogFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Assignment,
    Escalation,
    Decision,
    Expiration,
    ComplianceCheck,
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Create => "CREATE",
            AuditAction::Assignment => "ASSIGNMENT",
            AuditAction::Escalation => "ESCALATION",
            AuditAction::Decision => "DECISION",
            AuditAction::Expiration => "EXPIRATION",
            AuditAction::ComplianceCheck => "COMPLIANCE_CHECK",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
    Critical,
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub level: AuditLevel,
    pub entity_type: String,
    pub entity_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_values: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_values: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Destination for audit records. Must not drop records silently; sinks that
/// fail internally are responsible for logging their own failures.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Sink that writes the audit trail through `tracing` under a dedicated
/// target, as structured JSON or human-readable text.
pub struct TracingAuditSink {
    config: AuditConfig,
}

impl TracingAuditSink {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }
}

impl Default for TracingAuditSink {
    fn default() -> Self {
        Self::new(AuditConfig::default())
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        if !self.config.enabled {
            return;
        }
        let message = match self.config.format {
            LogFormat::Json => serde_json::to_string(&record)
                .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize: {}"}}"#, e)),
            LogFormat::Text => format!(
                "[{}] {} {} {}/{} - {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.action,
                record.entity_type,
                record.entity_id,
                record.actor.as_deref().unwrap_or("system"),
                record.description
            ),
        };

        // Tracing targets must be compile-time constants; the configured
        // target rides along as a field instead.
        match record.level {
            AuditLevel::Info => {
                tracing::info!(target: "compliance_audit", audit_target = %self.config.target, "{}", message)
            }
            AuditLevel::Warning => {
                tracing::warn!(target: "compliance_audit", audit_target = %self.config.target, "{}", message)
            }
            AuditLevel::Error | AuditLevel::Critical => {
                tracing::error!(target: "compliance_audit", audit_target = %self.config.target, "{}", message)
            }
        }
    }
}

/// In-memory sink capturing records for assertions in tests and for
/// embedders that batch-forward the trail.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: AuditLevel) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            action: AuditAction::Create,
            level,
            entity_type: "ComplianceCase".to_string(),
            entity_id: "case-1".to_string(),
            description: "Compliance case created".to_string(),
            actor: None,
            old_values: None,
            new_values: None,
            metadata: None,
        }
    }

    #[test]
    fn memory_sink_captures_records() {
        let sink = MemoryAuditSink::new();
        sink.record(record(AuditLevel::Info));
        sink.record(record(AuditLevel::Warning));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[1].level, AuditLevel::Warning);
    }

    #[test]
    fn record_serializes_with_wire_names() {
        let json = serde_json::to_value(record(AuditLevel::Info)).unwrap();
        assert_eq!(json["action"], "CREATE");
        assert_eq!(json["entityType"], "ComplianceCase");
        assert!(json.get("oldValues").is_none());
    }
}
