//! Core data model: detections, documents, profiles, audit records,
//! processing results, and integrity reports.
//!
//! All model types are serde value objects. Detections are immutable once
//! built; merges return new instances and record provenance in metadata.

pub mod audit;
pub mod document;
pub mod integrity;
pub mod pii;
pub mod processing;
pub mod profile;

pub use audit::{AuditLevel, AuditLog, AuditOperation, AuditTrail};
pub use document::{Document, DocumentFormat, PageInfo};
pub use integrity::{IntegrityIssue, IntegrityReport, IntegrityStatus, IssueSeverity};
pub use pii::{
    BoundingBox, CollectionStatistics, DetectionMethod, PIIDetection, PIIDetectionCollection,
    PIIType,
};
pub use processing::{
    BatchProcessingResult, BatchStatistics, ProcessingMetrics, ProcessingResult, ProcessingStatus,
};
pub use profile::{ConflictStrategy, ProfileConflict, RedactionProfile, RedactionStyle};
