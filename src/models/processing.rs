//! Processing results for single documents and batches.

use crate::models::audit::AuditLog;
use crate::models::pii::PIIDetectionCollection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle state of a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Timing and volume metrics for one processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProcessingMetrics {
    /// Total wall-clock time in milliseconds
    pub total_time_ms: u64,
    /// Time spent in detection
    pub detection_time_ms: u64,
    /// Time spent in redaction
    pub redaction_time_ms: u64,
    /// Pages processed
    pub pages_processed: u32,
    /// Detections found after filtering
    pub detections_found: usize,
    /// Peak memory in bytes, when sampled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_peak_bytes: Option<u64>,
}

/// Result of processing one document through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Result identifier
    pub id: Uuid,
    /// Identifier of the analyzed document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    /// Input document path
    pub input_document: PathBuf,
    /// Final detections
    pub detections: PIIDetectionCollection,
    /// Final audit record of the processing chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<AuditLog>,
    /// Redacted output path, when produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Lifecycle status
    pub status: ProcessingStatus,
    /// Convenience flag: `status == Completed`
    pub success: bool,
    /// When processing started
    pub started_at: DateTime<Utc>,
    /// When processing reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Fatal errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-fatal warnings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Profile in effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    /// Timing and volume metrics
    pub metrics: ProcessingMetrics,
}

impl ProcessingResult {
    /// Create a pending result for an input path.
    pub fn new(input_document: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: None,
            input_document: input_document.into(),
            detections: PIIDetectionCollection::new(),
            audit_log: None,
            output_path: None,
            status: ProcessingStatus::Pending,
            success: false,
            started_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            profile_name: None,
            metrics: ProcessingMetrics::default(),
        }
    }

    /// Mark the run in progress.
    pub fn start(&mut self) {
        self.status = ProcessingStatus::InProgress;
        self.started_at = Utc::now();
    }

    /// Mark the run completed.
    pub fn complete(&mut self, output_path: Option<PathBuf>) {
        self.status = ProcessingStatus::Completed;
        self.success = true;
        self.output_path = output_path;
        self.completed_at = Some(Utc::now());
        self.metrics.detections_found = self.detections.len();
    }

    /// Mark the run failed with an error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ProcessingStatus::Failed;
        self.success = false;
        self.errors.push(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run cancelled.
    pub fn cancel(&mut self) {
        self.status = ProcessingStatus::Cancelled;
        self.success = false;
        self.completed_at = Some(Utc::now());
    }

    /// Record a non-fatal warning.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Whether the run reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProcessingStatus::Completed | ProcessingStatus::Failed | ProcessingStatus::Cancelled
        )
    }
}

/// Aggregate statistics for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatchStatistics {
    /// Documents that completed
    pub successful: usize,
    /// Documents that failed
    pub failed: usize,
    /// Documents cancelled before running
    pub cancelled: usize,
    /// Total detections across all documents
    pub total_detections: usize,
    /// Sum of per-document processing time
    pub total_time_ms: u64,
    /// Extra counters keyed by name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

/// Result of processing a directory of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProcessingResult {
    /// Batch identifier
    pub id: Uuid,
    /// Input directory
    pub input_directory: PathBuf,
    /// Output directory
    pub output_directory: PathBuf,
    /// Per-document results
    pub results: Vec<ProcessingResult>,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// When the batch finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Documents discovered for processing
    pub total_documents: usize,
    /// Profile in effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    /// Whether the batch continued past per-document failures
    pub continue_on_error: bool,
    /// Aggregate statistics
    pub statistics: BatchStatistics,
}

impl BatchProcessingResult {
    /// Create an empty batch result.
    pub fn new(input_directory: impl Into<PathBuf>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_directory: input_directory.into(),
            output_directory: output_directory.into(),
            results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            total_documents: 0,
            profile_name: None,
            continue_on_error: true,
            statistics: BatchStatistics::default(),
        }
    }

    /// Append a per-document result and fold it into the statistics.
    pub fn push_result(&mut self, result: ProcessingResult) {
        match result.status {
            ProcessingStatus::Completed => self.statistics.successful += 1,
            ProcessingStatus::Failed => self.statistics.failed += 1,
            ProcessingStatus::Cancelled => self.statistics.cancelled += 1,
            _ => {}
        }
        self.statistics.total_detections += result.detections.len();
        self.statistics.total_time_ms += result.metrics.total_time_ms;
        self.results.push(result);
    }

    /// Percentage of successful documents, `successful / total * 100`.
    pub fn success_rate(&self) -> f64 {
        if self.total_documents == 0 {
            return 0.0;
        }
        self.statistics.successful as f64 / self.total_documents as f64 * 100.0
    }

    /// Mark the batch finished.
    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lifecycle_transitions() {
        let mut r = ProcessingResult::new("/tmp/a.pdf");
        assert_eq!(r.status, ProcessingStatus::Pending);
        assert!(!r.is_terminal());

        r.start();
        assert_eq!(r.status, ProcessingStatus::InProgress);

        r.complete(Some(PathBuf::from("/tmp/redacted_a.pdf")));
        assert!(r.success);
        assert!(r.is_terminal());
        assert!(r.completed_at.unwrap() >= r.started_at);
    }

    #[test]
    fn test_fail_records_error() {
        let mut r = ProcessingResult::new("/tmp/a.pdf");
        r.start();
        r.fail("decode error");
        assert_eq!(r.status, ProcessingStatus::Failed);
        assert!(!r.success);
        assert_eq!(r.errors, vec!["decode error".to_string()]);
    }

    #[test]
    fn test_detection_count_matches_metrics() {
        use crate::models::pii::{BoundingBox, DetectionMethod, PIIDetection, PIIType};

        let mut r = ProcessingResult::new("/tmp/a.png");
        r.start();
        r.detections.add(
            PIIDetection::new(
                PIIType::Email,
                BoundingBox::new(0, 0, 10, 10).unwrap(),
                0.9,
                0,
                DetectionMethod::Nlp,
            )
            .unwrap(),
        );
        r.complete(None);
        assert_eq!(r.metrics.detections_found, r.detections.len());
    }

    #[test]
    fn test_batch_statistics_and_success_rate() {
        let mut batch = BatchProcessingResult::new("/in", "/out");
        batch.total_documents = 4;

        for i in 0..4 {
            let mut r = ProcessingResult::new(format!("/in/doc{}.pdf", i));
            r.start();
            if i == 3 {
                r.fail("zero bytes");
            } else {
                r.complete(None);
            }
            batch.push_result(r);
        }
        batch.finish();

        assert_eq!(batch.statistics.successful, 3);
        assert_eq!(batch.statistics.failed, 1);
        assert_eq!(batch.success_rate(), 75.0);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn test_empty_batch_success_rate() {
        let batch = BatchProcessingResult::new("/in", "/out");
        assert_eq!(batch.success_rate(), 0.0);
    }
}
