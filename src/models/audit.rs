//! Audit log records and trails.
//!
//! An audit log is an append-only record of one operation. Logs within one
//! document's processing share a `chain_id` and point at their predecessor
//! via `parent_id`, so the chain is reconstructed by query rather than by
//! in-memory pointers. The content hash excludes the `signature` field, which
//! makes signing idempotent.

use crate::crypto;
use crate::error::Result;
use crate::models::pii::PIIDetectionCollection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Operations recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    DocumentUpload,
    PiiDetection,
    DocumentRedaction,
    DocumentValidation,
    ProfileLoad,
    ErrorOccurred,
    SystemStartup,
    SystemShutdown,
    BatchProcessing,
    SystemOperation,
}

impl AuditOperation {
    /// Snake-case name used in storage and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentUpload => "document_upload",
            Self::PiiDetection => "pii_detection",
            Self::DocumentRedaction => "document_redaction",
            Self::DocumentValidation => "document_validation",
            Self::ProfileLoad => "profile_load",
            Self::ErrorOccurred => "error_occurred",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
            Self::BatchProcessing => "batch_processing",
            Self::SystemOperation => "system_operation",
        }
    }

    /// Parse a snake-case operation name.
    pub fn parse(s: &str) -> Option<AuditOperation> {
        [
            Self::DocumentUpload,
            Self::PiiDetection,
            Self::DocumentRedaction,
            Self::DocumentValidation,
            Self::ProfileLoad,
            Self::ErrorOccurred,
            Self::SystemStartup,
            Self::SystemShutdown,
            Self::BatchProcessing,
            Self::SystemOperation,
        ]
        .into_iter()
        .find(|op| op.as_str() == s)
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditLevel {
    /// Lowercase name used in storage and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Parse a lowercase level name.
    pub fn parse(s: &str) -> Option<AuditLevel> {
        [Self::Debug, Self::Info, Self::Warning, Self::Error, Self::Critical]
            .into_iter()
            .find(|l| l.as_str() == s)
    }
}

impl std::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One signed, append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Unique log identifier
    pub id: Uuid,
    /// Operation performed
    pub operation: AuditOperation,
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,
    /// Record severity
    pub level: AuditLevel,
    /// Document the operation applied to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// User performing the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Session the operation belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Redaction profile in effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    /// Detection counts keyed by PII type
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub detections_summary: HashMap<String, usize>,
    /// SHA-256 of the input document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_hash: Option<String>,
    /// SHA-256 of the produced output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    /// Paths touched by the operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_paths: Vec<String>,
    /// Error message for failed operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Non-fatal warnings accumulated by the operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warning_messages: Vec<String>,
    /// Wall-clock processing time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Peak memory in bytes, when sampled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
    /// Base64 signature over the content hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Immediately preceding log in the same chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Stable identifier shared by all logs of one processing chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Uuid>,
    /// Host and runtime information
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub system_info: HashMap<String, String>,
    /// Free-form operation details
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
}

impl AuditLog {
    /// Create a record for an operation at a severity.
    pub fn new(operation: AuditOperation, level: AuditLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            timestamp: Utc::now(),
            level,
            document_id: None,
            user_id: None,
            session_id: None,
            profile_name: None,
            detections_summary: HashMap::new(),
            input_hash: None,
            output_hash: None,
            file_paths: Vec::new(),
            error_message: None,
            warning_messages: Vec::new(),
            processing_time_ms: None,
            memory_usage: None,
            signature: None,
            parent_id: None,
            chain_id: None,
            system_info: HashMap::new(),
            details: HashMap::new(),
        }
    }

    /// Set the document ID.
    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Set the user ID.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the profile name.
    pub fn with_profile(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    /// Set chain membership.
    pub fn with_chain(mut self, chain_id: Uuid, parent_id: Option<Uuid>) -> Self {
        self.chain_id = Some(chain_id);
        self.parent_id = parent_id;
        self
    }

    /// Record a touched file path.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Set the error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set input and output hashes.
    pub fn with_hashes(mut self, input: Option<String>, output: Option<String>) -> Self {
        self.input_hash = input;
        self.output_hash = output;
        self
    }

    /// Add a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Summarize detection counts by type into the record.
    pub fn with_detections(mut self, detections: &PIIDetectionCollection) -> Self {
        self.detections_summary = detections.statistics().by_type;
        self
    }

    /// Whether the record carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// SHA-256 of the canonical JSON form, excluding `signature`.
    ///
    /// serde_json orders object keys, so the same field values always produce
    /// the same hash regardless of construction order.
    pub fn content_hash(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("signature");
        }
        Ok(crypto::sha256_bytes(serde_json::to_string(&value)?.as_bytes()))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Ordered logs for a logical unit, typically one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    /// Trail identifier
    pub id: Uuid,
    /// Trail name
    pub name: String,
    /// Trail metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Logs in insertion order
    pub logs: Vec<AuditLog>,
}

impl AuditTrail {
    /// Create an empty trail.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            metadata: HashMap::new(),
            logs: Vec::new(),
        }
    }

    /// Append a log.
    pub fn append(&mut self, log: AuditLog) {
        self.logs.push(log);
    }

    /// Logs within `[start, end]` inclusive.
    pub fn in_timeframe(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&AuditLog> {
        self.logs
            .iter()
            .filter(|l| l.timestamp >= start && l.timestamp <= end)
            .collect()
    }

    /// Logs for one operation.
    pub fn for_operation(&self, operation: AuditOperation) -> Vec<&AuditLog> {
        self.logs.iter().filter(|l| l.operation == operation).collect()
    }

    /// Logs in one chain, ordered as inserted.
    pub fn for_chain(&self, chain_id: Uuid) -> Vec<&AuditLog> {
        self.logs
            .iter()
            .filter(|l| l.chain_id == Some(chain_id))
            .collect()
    }

    /// Logs for one document.
    pub fn for_document(&self, document_id: &str) -> Vec<&AuditLog> {
        self.logs
            .iter()
            .filter(|l| l.document_id.as_deref() == Some(document_id))
            .collect()
    }

    /// Logs for one user.
    pub fn for_user(&self, user_id: &str) -> Vec<&AuditLog> {
        self.logs
            .iter()
            .filter(|l| l.user_id.as_deref() == Some(user_id))
            .collect()
    }

    /// Check trail integrity: unique IDs, non-decreasing timestamps, and
    /// verifiable signatures (via `verify`). Returns one message per issue.
    pub fn verify_integrity<F>(&self, mut verify: F) -> Vec<String>
    where
        F: FnMut(&AuditLog) -> Result<bool>,
    {
        let mut issues = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for log in &self.logs {
            if !seen.insert(log.id) {
                issues.push(format!("duplicate log id {}", log.id));
            }
        }

        for pair in self.logs.windows(2) {
            if pair[1].timestamp < pair[0].timestamp {
                issues.push(format!(
                    "timestamp regression between {} and {}",
                    pair[0].id, pair[1].id
                ));
            }
        }

        for log in self.logs.iter().filter(|l| l.is_signed()) {
            match verify(log) {
                Ok(true) => {}
                Ok(false) => issues.push(format!("signature verification failed for {}", log.id)),
                Err(e) => issues.push(format!("signature check error for {}: {}", log.id, e)),
            }
        }

        issues
    }
}
