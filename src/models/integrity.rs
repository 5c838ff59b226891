//! Integrity reports: structured verdicts on document and audit consistency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Overall verdict of an integrity validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// Document and audit data are consistent
    Valid,
    /// Document hash differs from the expected hash
    HashMismatch,
    /// Audit signature failed verification
    SignatureMismatch,
    /// Audit data is missing required fields or malformed
    AuditTrailInvalid,
    /// Document or audit data is absent
    MissingData,
    /// Document bytes are unreadable or inconsistent
    Corrupted,
}

impl std::fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Valid => "valid",
            Self::HashMismatch => "hash_mismatch",
            Self::SignatureMismatch => "signature_mismatch",
            Self::AuditTrailInvalid => "audit_trail_invalid",
            Self::MissingData => "missing_data",
            Self::Corrupted => "corrupted",
        };
        write!(f, "{}", s)
    }
}

/// Severity of an individual integrity issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// One finding produced during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    /// Machine-readable issue type, e.g. `hash_mismatch`, `empty_file`
    pub issue_type: String,
    /// Severity of the finding
    pub severity: IssueSeverity,
    /// Human-readable message
    pub message: String,
    /// Structured details
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
    /// Component the issue concerns (document, audit_log, signature)
    pub affected_component: String,
    /// Suggested remediation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl IntegrityIssue {
    /// Create an issue.
    pub fn new(
        issue_type: impl Into<String>,
        severity: IssueSeverity,
        message: impl Into<String>,
        affected_component: impl Into<String>,
    ) -> Self {
        Self {
            issue_type: issue_type.into(),
            severity,
            message: message.into(),
            details: HashMap::new(),
            affected_component: affected_component.into(),
            recommendation: None,
        }
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Attach a remediation hint.
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// Structured verdict on whether a document's bytes and audit trail match
/// expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Document the report concerns
    pub document_id: String,
    /// When validation ran
    pub validation_timestamp: DateTime<Utc>,
    /// Overall verdict
    pub overall_result: IntegrityStatus,
    /// Computed document hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,
    /// Expected hash supplied by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
    /// Signature verification outcome, when a signature was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_valid: Option<bool>,
    /// Audit trail structural validity, when audit data was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_trail_valid: Option<bool>,
    /// Individual findings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<IntegrityIssue>,
    /// Report metadata (file size, paths)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Validation wall-clock time in milliseconds
    pub processing_time_ms: u64,
}

impl IntegrityReport {
    /// Create an empty report for a document, initially `Valid`.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            validation_timestamp: Utc::now(),
            overall_result: IntegrityStatus::Valid,
            document_hash: None,
            expected_hash: None,
            signature_valid: None,
            audit_trail_valid: None,
            issues: Vec::new(),
            metadata: HashMap::new(),
            processing_time_ms: 0,
        }
    }

    /// Append an issue.
    pub fn add_issue(&mut self, issue: IntegrityIssue) {
        self.issues.push(issue);
    }

    /// Whether any issue has error severity.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One CSV row: `document_id, result, hash, signature_valid, issues`.
    pub fn to_csv_row(&self) -> Vec<String> {
        vec![
            self.document_id.clone(),
            self.overall_result.to_string(),
            self.document_hash.clone().unwrap_or_default(),
            self.signature_valid
                .map(|v| v.to_string())
                .unwrap_or_default(),
            self.issues.len().to_string(),
        ]
    }
}
