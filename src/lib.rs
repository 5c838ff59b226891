//! # veil-core
//!
//! A forensic-grade document deidentification engine: detect personally-
//! identifiable information in PDF and raster documents with a hybrid of
//! vision and text analysis, apply coordinate-accurate redactions that
//! preserve page layout, and emit a cryptographically signed audit trail
//! linking the original and redacted artifacts.
//!
//! ## Core Components
//!
//! - **Analyzer**: decode documents into pages, geometry, and text
//! - **Detection**: CV and NLP sub-engines composed by the hybrid engine
//! - **Redaction**: style-specific, layout-preserving redaction per format
//! - **Profiles**: hierarchical, inheritable rule sets with conflict resolution
//! - **Audit**: signed, append-only logs with per-document chains
//! - **Jobs**: an async facade over the synchronous processor
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use veil_core::{
//!     AuditLogger, AuditLoggerConfig, DocumentProcessor, EngineConfig,
//!     HybridDetectionEngine, RedactionProfile,
//! };
//!
//! let config = EngineConfig::default();
//! let audit = Arc::new(AuditLogger::open(&config.storage_dir, AuditLoggerConfig::default())?);
//! let hybrid = HybridDetectionEngine::from_engine_config(&config);
//! let processor = DocumentProcessor::new(config, Some(hybrid), Some(audit));
//!
//! let mut profile = RedactionProfile::named("default");
//! profile.text_rules.insert("email".into(), true);
//!
//! let result = processor.process_document("scan.png".as_ref(), &profile);
//! println!("{} detections -> {:?}", result.detections.len(), result.output_path);
//! ```

pub mod analyzer;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod detection;
pub mod error;
pub mod integrity;
pub mod jobs;
pub mod models;
pub mod processor;
pub mod profiles;
pub mod protect;
pub mod redaction;
pub mod secure_io;

// Re-exports for convenience
pub use analyzer::DocumentAnalyzer;
pub use audit::{AuditLogger, AuditLoggerConfig, AuditQuery, AuditStore};
pub use config::EngineConfig;
pub use crypto::{
    secure_bytes, secure_id, sha256_bytes, sha256_file, sign_content_hash, verify_content_hash,
    SigningKeyPair, VerifyingKeyHandle,
};
pub use detection::{
    CvConfig, CvDetector, DetectionInput, HybridConfig, HybridDetectionEngine, NlpConfig,
    NlpDetector, PIIDetector, PageRaster, SpanCoordinate, TextInput,
};
pub use error::{Error, ProcessingStage, Result};
pub use integrity::{AuditSource, IntegritySummary, IntegrityValidator};
pub use jobs::{Job, JobManager, JobResult, JobStatus, JobType};
pub use models::{
    AuditLevel, AuditLog, AuditOperation, AuditTrail, BatchProcessingResult, BatchStatistics,
    BoundingBox, CollectionStatistics, ConflictStrategy, DetectionMethod, Document,
    DocumentFormat, IntegrityIssue, IntegrityReport, IntegrityStatus, IssueSeverity,
    PIIDetection, PIIDetectionCollection, PIIType, PageInfo, ProcessingMetrics, ProcessingResult,
    ProcessingStatus, ProfileConflict, RedactionProfile, RedactionStyle,
};
pub use processor::{CancelFlag, DocumentProcessor, ProcessorStatistics};
pub use profiles::{ProfileFormat, ProfileManager};
pub use protect::{CleanupReport, MemoryGuard};
pub use redaction::{RedactionEngine, RedactionOutcome, RedactionStats};
pub use secure_io::{SecureTempDir, SecureTempFile};
