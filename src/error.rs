//! Error types for veil-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using veil-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage in which a document-level failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    /// Document decode and page extraction
    Analyze,
    /// PII detection (CV, NLP, or hybrid)
    Detect,
    /// Redaction application
    Redact,
    /// Audit log persistence
    Audit,
    /// Integrity validation
    Validate,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Analyze => "analyze",
            Self::Detect => "detect",
            Self::Redact => "redact",
            Self::Audit => "audit",
            Self::Validate => "validate",
        };
        write!(f, "{}", s)
    }
}

/// Errors that can occur during deidentification operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Document decode, detection, or redaction failure tied to a pipeline stage
    #[error("Document processing error at {stage} stage for '{path}': {message}")]
    DocumentProcessing {
        stage: ProcessingStage,
        path: String,
        message: String,
    },

    /// Malformed or circular redaction profile
    #[error("Profile validation error: {0}")]
    ProfileValidation(String),

    /// Unresolvable profile merge under the strict strategy
    #[error("Profile conflict: {0}")]
    ProfileConflict(String),

    /// Key load, signing, or verification failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Audit database failure
    #[error("Audit storage error: {0}")]
    AuditStorage(String),

    /// Malformed configuration input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cooperative cancellation observed between stages
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Stage deadline exceeded
    #[error("Stage {stage} timed out after {duration_ms}ms")]
    Timeout {
        stage: ProcessingStage,
        duration_ms: u64,
    },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse or emit error
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a document processing error for a stage and path.
    pub fn document_processing(
        stage: ProcessingStage,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DocumentProcessing {
            stage,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a profile validation error.
    pub fn profile_validation(message: impl Into<String>) -> Self {
        Self::ProfileValidation(message.into())
    }

    /// Create a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Create an audit storage error.
    pub fn audit_storage(message: impl Into<String>) -> Self {
        Self::AuditStorage(message.into())
    }

    /// Create a stage timeout error.
    pub fn timeout(stage: ProcessingStage, duration_ms: u64) -> Self {
        Self::Timeout { stage, duration_ms }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}
