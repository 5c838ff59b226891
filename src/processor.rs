//! Document processor: orchestrates analyze → detect → redact → audit for
//! single documents and batches.

use crate::analyzer::{load_page_raster, DocumentAnalyzer};
use crate::audit::AuditLogger;
use crate::config::EngineConfig;
use crate::detection::{DetectionInput, HybridDetectionEngine, PageRaster, TextInput};
use crate::error::{ProcessingStage, Result};
use crate::integrity::{AuditSource, IntegrityValidator};
use crate::models::audit::{AuditLevel, AuditLog, AuditOperation};
use crate::models::document::Document;
use crate::models::pii::PIIDetectionCollection;
use crate::models::processing::{BatchProcessingResult, ProcessingResult};
use crate::models::profile::RedactionProfile;
use crate::redaction::{redacted_output_path, RedactionEngine};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cooperative cancellation flag shared between the job manager and the
/// processor. Stages check it between steps; inflight work completes.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Rolling counters over processed documents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessorStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub average_processing_time_ms: f64,
}

/// Orchestrates the per-document pipeline and batch fan-out.
pub struct DocumentProcessor {
    analyzer: DocumentAnalyzer,
    hybrid: Option<HybridDetectionEngine>,
    redactor: RedactionEngine,
    audit: Option<Arc<AuditLogger>>,
    config: EngineConfig,
    cancel: CancelFlag,
    stats: Mutex<ProcessorStatistics>,
    audit_degraded: AtomicBool,
}

impl DocumentProcessor {
    /// Compose a processor from its collaborators.
    pub fn new(
        config: EngineConfig,
        hybrid: Option<HybridDetectionEngine>,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        Self {
            analyzer: DocumentAnalyzer::new(config.clone()),
            hybrid,
            redactor: RedactionEngine::new(),
            audit,
            config,
            cancel: CancelFlag::new(),
            stats: Mutex::new(ProcessorStatistics::default()),
            audit_degraded: AtomicBool::new(false),
        }
    }

    /// The cancellation flag observed between stages.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Process one document through the full pipeline.
    ///
    /// Failures are returned inside the [`ProcessingResult`]; this method
    /// does not raise past the boundary.
    pub fn process_document(&self, path: &Path, profile: &RedactionProfile) -> ProcessingResult {
        let started = Instant::now();
        let mut result = ProcessingResult::new(path);
        result.profile_name = Some(profile.name.clone());
        result.start();

        let chain_id = Uuid::new_v4();

        // Analyze. Validation failures (missing, oversized, unsupported)
        // surface here as a failed result.
        let document = match self.analyzer.analyze(path) {
            Ok(document) => document,
            Err(e) => {
                result.fail(e.to_string());
                self.record_error(&mut result, &e.to_string(), None);
                self.fold_stats(&result, started);
                return result;
            }
        };
        result.document_id = Some(document.id);
        result.metrics.pages_processed = document.page_count() as u32;
        if let Some(Value::Array(warnings)) = document.metadata.get("decode_warnings") {
            for w in warnings.iter().filter_map(|v| v.as_str()) {
                result.add_warning(w.to_string());
            }
        }

        let input_hash = document.file_hash.clone();
        let upload_log = AuditLog::new(AuditOperation::DocumentUpload, AuditLevel::Info)
            .with_document_id(document.id.to_string())
            .with_profile(profile.name.clone())
            .with_chain(chain_id, None)
            .with_hashes(input_hash.clone(), None)
            .with_file_path(path.display().to_string());
        let upload_log = self.record_log(&mut result, upload_log);

        if self.cancel.is_cancelled() {
            result.cancel();
            self.fold_stats(&result, started);
            return result;
        }

        // Detect.
        let detection_started = Instant::now();
        let detections = match &self.hybrid {
            Some(hybrid) => self.run_detection(hybrid, &document, profile),
            // Without an AI engine the detection set is empty and the input
            // is still copied to the output location.
            None => PIIDetectionCollection::for_document(document.id),
        };
        result.metrics.detection_time_ms = detection_started.elapsed().as_millis() as u64;
        result.detections = detections;

        if let Some(e) = self.stage_deadline_exceeded(ProcessingStage::Detect, detection_started) {
            result.fail(e.to_string());
            self.record_error(&mut result, &e.to_string(), Some(&document));
            self.fold_stats(&result, started);
            return result;
        }

        let detect_log = AuditLog::new(AuditOperation::PiiDetection, AuditLevel::Info)
            .with_document_id(document.id.to_string())
            .with_profile(profile.name.clone())
            .with_chain(chain_id, upload_log.as_ref().map(|l| l.id))
            .with_detections(&result.detections);
        let detect_log = self.record_log(&mut result, detect_log);

        if self.cancel.is_cancelled() {
            result.cancel();
            self.fold_stats(&result, started);
            return result;
        }

        // Redact.
        let redaction_started = Instant::now();
        let output_path = if self.hybrid.is_some() {
            match self
                .redactor
                .apply_redactions(path, &result.detections, profile)
            {
                Ok(outcome) => {
                    for w in outcome.warnings {
                        result.add_warning(w);
                    }
                    Some(outcome.output_path)
                }
                Err(e) => {
                    result.fail(e.to_string());
                    self.record_error(&mut result, &e.to_string(), Some(&document));
                    self.fold_stats(&result, started);
                    return result;
                }
            }
        } else {
            match copy_to_output(path) {
                Ok(output) => Some(output),
                Err(e) => {
                    result.fail(e.to_string());
                    self.fold_stats(&result, started);
                    return result;
                }
            }
        };
        result.metrics.redaction_time_ms = redaction_started.elapsed().as_millis() as u64;

        if let Some(e) = self.stage_deadline_exceeded(ProcessingStage::Redact, redaction_started) {
            result.fail(e.to_string());
            self.record_error(&mut result, &e.to_string(), Some(&document));
            self.fold_stats(&result, started);
            return result;
        }

        let output_hash = output_path
            .as_deref()
            .and_then(|p| crate::crypto::sha256_file(p).ok());

        let final_log = AuditLog::new(AuditOperation::DocumentRedaction, AuditLevel::Info)
            .with_document_id(document.id.to_string())
            .with_profile(profile.name.clone())
            .with_chain(chain_id, detect_log.as_ref().map(|l| l.id))
            .with_hashes(input_hash.clone(), output_hash.clone())
            .with_detections(&result.detections);
        let final_log = self.record_log(&mut result, final_log);
        result.audit_log = final_log;

        result.complete(output_path);
        result.metrics.total_time_ms = started.elapsed().as_millis() as u64;
        self.fold_stats(&result, started);

        info!(
            "Processed {} ({} detections, {} ms)",
            path.display(),
            result.detections.len(),
            result.metrics.total_time_ms
        );
        result
    }

    /// Run the hybrid engine over every page, collecting failures as empty
    /// page results.
    fn run_detection(
        &self,
        hybrid: &HybridDetectionEngine,
        document: &Document,
        profile: &RedactionProfile,
    ) -> PIIDetectionCollection {
        let mut collection = PIIDetectionCollection::for_document(document.id);

        for page in &document.pages {
            let image = if document.format.is_raster() {
                match load_page_raster(&document.path) {
                    Ok(img) => Some(PageRaster::for_page(img, page.page_number)),
                    Err(e) => {
                        warn!("Raster load failed for detection: {}", e);
                        None
                    }
                }
            } else {
                None
            };
            let text = page
                .text_content
                .as_ref()
                .map(|t| TextInput::plain(t.clone()).on_page(page.page_number));

            if image.is_none() && text.is_none() {
                continue;
            }

            let input = DetectionInput::Structured { image, text };
            for detection in hybrid.detect(&input, Some(profile)) {
                collection.add(detection);
            }
        }

        debug!(
            "Detection over {} pages found {} PII regions",
            document.page_count(),
            collection.len()
        );
        collection
    }

    /// When a stage deadline is configured and exceeded, the error that
    /// fails the document.
    fn stage_deadline_exceeded(
        &self,
        stage: ProcessingStage,
        stage_started: Instant,
    ) -> Option<crate::error::Error> {
        let deadline = self.config.stage_timeout_ms?;
        let elapsed = stage_started.elapsed().as_millis() as u64;
        (elapsed > deadline).then(|| crate::error::Error::timeout(stage, elapsed))
    }

    /// Persist a chained audit record, degrading (not failing) on audit
    /// errors.
    fn record_log(&self, result: &mut ProcessingResult, log: AuditLog) -> Option<AuditLog> {
        let audit = self.audit.as_ref()?;
        match audit.log_operation(log) {
            Ok(log) => Some(log),
            Err(e) => {
                self.audit_degraded.store(true, Ordering::SeqCst);
                result.add_warning(format!("audit logging failed: {}", e));
                None
            }
        }
    }

    fn record_error(&self, result: &mut ProcessingResult, message: &str, document: Option<&Document>) {
        if let Some(audit) = &self.audit {
            let document_id = document.map(|d| d.id.to_string());
            if let Err(e) = audit.log_error(message, document_id.as_deref()) {
                self.audit_degraded.store(true, Ordering::SeqCst);
                result.add_warning(format!("audit logging failed: {}", e));
            }
        }
    }

    fn fold_stats(&self, result: &ProcessingResult, started: Instant) {
        let elapsed = started.elapsed().as_millis() as f64;
        let mut stats = self.stats.lock().expect("stats lock poisoned");
        stats.total += 1;
        if result.success {
            stats.successful += 1;
        } else {
            stats.failed += 1;
        }
        stats.average_processing_time_ms = stats.average_processing_time_ms
            + (elapsed - stats.average_processing_time_ms) / stats.total as f64;
    }

    /// Process every supported file under a directory.
    ///
    /// Documents run on up to `max_concurrency` worker threads. With
    /// `continue_on_error` (the default), per-document failures do not stop
    /// the batch. On cancellation, inflight documents finish, the remainder
    /// are marked cancelled, and a system-operation log records the cancel.
    pub fn batch_process(
        &self,
        input_dir: &Path,
        profile: &RedactionProfile,
        recursive: bool,
        continue_on_error: bool,
    ) -> BatchProcessingResult {
        let mut batch = BatchProcessingResult::new(input_dir, input_dir);
        batch.profile_name = Some(profile.name.clone());
        batch.continue_on_error = continue_on_error;

        let files = self.enumerate_supported(input_dir, recursive);
        batch.total_documents = files.len();

        let queue: Mutex<VecDeque<PathBuf>> = Mutex::new(files.into());
        let results: Mutex<Vec<ProcessingResult>> = Mutex::new(Vec::new());
        let stop = AtomicBool::new(false);

        let workers = self.config.max_concurrency.max(1);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if stop.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
                        break;
                    }
                    let Some(path) = queue.lock().expect("queue lock poisoned").pop_front() else {
                        break;
                    };

                    let result = self.process_document(&path, profile);
                    if !result.success && !continue_on_error {
                        stop.store(true, Ordering::SeqCst);
                    }
                    results.lock().expect("results lock poisoned").push(result);
                });
            }
        });

        for result in results.into_inner().expect("results lock poisoned") {
            batch.push_result(result);
        }

        // Anything still queued was never started: mark it cancelled.
        let remaining: Vec<PathBuf> = queue.into_inner().expect("queue lock poisoned").into();
        let was_cancelled = self.cancel.is_cancelled();
        for path in remaining {
            let mut result = ProcessingResult::new(path);
            result.profile_name = Some(profile.name.clone());
            result.cancel();
            batch.push_result(result);
        }
        if was_cancelled {
            if let Some(audit) = &self.audit {
                if let Err(e) = audit.log_system_operation("batch processing cancelled") {
                    warn!("audit logging failed during cancel: {}", e);
                }
            }
        }

        batch.finish();
        info!(
            "Batch over {} finished: {}/{} successful",
            input_dir.display(),
            batch.statistics.successful,
            batch.total_documents
        );
        batch
    }

    /// Supported files under a directory, sorted for deterministic order.
    fn enumerate_supported(&self, dir: &Path, recursive: bool) -> Vec<PathBuf> {
        let walker = if recursive {
            walkdir::WalkDir::new(dir)
        } else {
            walkdir::WalkDir::new(dir).max_depth(1)
        };

        let mut files: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.analyzer.is_supported(p))
            .collect();
        files.sort();
        files
    }

    /// Check a document against its audit record.
    pub fn validate_document(&self, path: &Path, audit_log: AuditLog) -> bool {
        let validator = match self.audit.as_ref().and_then(|a| a.verifying_handle()) {
            Some(handle) => IntegrityValidator::with_verifier(handle),
            None => IntegrityValidator::new(),
        };
        let expected_hash = audit_log
            .output_hash
            .clone()
            .or_else(|| audit_log.input_hash.clone());
        let report = validator.validate(
            path,
            expected_hash.as_deref(),
            Some(AuditSource::Record(Box::new(audit_log))),
        );
        report.overall_result == crate::models::integrity::IntegrityStatus::Valid
    }

    /// Component health: `healthy`, or `degraded` when the AI engine or
    /// audit system is absent or audit writes have started failing. The
    /// analyzer and redaction engine are owned fields that exist whenever
    /// the processor does, so no worse state is representable.
    pub fn health_check(&self) -> HashMap<String, Value> {
        let ai_ok = self
            .hybrid
            .as_ref()
            .map(|h| h.has_engines())
            .unwrap_or(false);
        let audit_ok = self.audit.is_some() && !self.audit_degraded.load(Ordering::SeqCst);

        let status = if ai_ok && audit_ok { "healthy" } else { "degraded" };
        let stats = self.processing_statistics();

        HashMap::from([
            ("status".to_string(), json!(status)),
            (
                "components".to_string(),
                json!({
                    "analyzer": true,
                    "redaction_engine": true,
                    "ai_engine": ai_ok,
                    "audit_system": audit_ok,
                }),
            ),
            (
                "supported_formats".to_string(),
                json!(self.config.supported_formats),
            ),
            (
                "statistics".to_string(),
                json!({
                    "total": stats.total,
                    "successful": stats.successful,
                    "failed": stats.failed,
                    "average_processing_time_ms": stats.average_processing_time_ms,
                }),
            ),
        ])
    }

    /// Current rolling counters.
    pub fn processing_statistics(&self) -> ProcessorStatistics {
        *self.stats.lock().expect("stats lock poisoned")
    }

    /// Zero the rolling counters.
    pub fn reset_processing_statistics(&self) {
        *self.stats.lock().expect("stats lock poisoned") = ProcessorStatistics::default();
    }
}

/// Copy the input to the redacted output location unchanged.
fn copy_to_output(path: &Path) -> Result<PathBuf> {
    let output = redacted_output_path(path);
    std::fs::copy(path, &output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLoggerConfig, AuditQuery, AuditStore};
    use crate::crypto::SigningKeyPair;
    use crate::models::processing::ProcessingStatus;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn test_logger() -> Arc<AuditLogger> {
        Arc::new(AuditLogger::new(
            AuditStore::in_memory().unwrap(),
            Some(SigningKeyPair::generate().unwrap()),
            AuditLoggerConfig::default(),
        ))
    }

    fn full_processor() -> DocumentProcessor {
        let config = EngineConfig::default();
        let hybrid = HybridDetectionEngine::from_engine_config(&config);
        DocumentProcessor::new(config, Some(hybrid), Some(test_logger()))
    }

    fn open_profile(threshold: f64) -> RedactionProfile {
        let mut p = RedactionProfile::named("everything");
        for t in crate::models::pii::PIIType::all() {
            if t.is_visual() {
                p.visual_rules.insert(t.as_str().to_string(), true);
            } else {
                p.text_rules.insert(t.as_str().to_string(), true);
            }
        }
        p.confidence_threshold = threshold;
        p
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut img = RgbImage::from_pixel(400, 400, Rgb([255u8, 255, 255]));
        // A dark blob the CV heuristic reports as a face
        for y in 120..260 {
            for x in 150..260 {
                img.put_pixel(x, y, Rgb([0u8, 0, 0]));
            }
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_file_returns_failed_result() {
        let processor = full_processor();
        let result =
            processor.process_document(Path::new("/no/such/file.png"), &open_profile(0.5));
        assert_eq!(result.status, ProcessingStatus::Failed);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn test_image_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "scan.png");
        let processor = full_processor();

        let result = processor.process_document(&input, &open_profile(0.5));
        assert_eq!(result.status, ProcessingStatus::Completed);
        assert!(result.success);
        assert!(!result.detections.is_empty());
        let output = result.output_path.as_ref().unwrap();
        assert!(output.exists());
        assert_ne!(
            crate::crypto::sha256_file(&input).unwrap(),
            crate::crypto::sha256_file(output).unwrap()
        );
        assert!(result.started_at <= result.completed_at.unwrap());
        assert_eq!(result.metrics.detections_found, result.detections.len());
        assert!(result.metrics.total_time_ms >= result.metrics.detection_time_ms);
    }

    #[test]
    fn test_audit_chain_shares_chain_id() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "chained.png");
        let logger = test_logger();
        let config = EngineConfig::default();
        let processor = DocumentProcessor::new(
            config.clone(),
            Some(HybridDetectionEngine::from_engine_config(&config)),
            Some(Arc::clone(&logger)),
        );

        let result = processor.process_document(&input, &open_profile(0.5));
        assert!(result.success);

        let final_log = result.audit_log.as_ref().unwrap();
        let chain_id = final_log.chain_id.unwrap();
        let chain = logger
            .query(&AuditQuery::default().chain(chain_id), None)
            .unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].operation, AuditOperation::DocumentUpload);
        assert_eq!(chain[1].operation, AuditOperation::PiiDetection);
        assert_eq!(chain[2].operation, AuditOperation::DocumentRedaction);
        // parent_id links reconstruct insertion order
        assert_eq!(chain[1].parent_id, Some(chain[0].id));
        assert_eq!(chain[2].parent_id, Some(chain[1].id));
        assert!(chain.iter().all(|l| l.is_signed()));
    }

    #[test]
    fn test_no_engine_copies_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "copy.png");
        let processor =
            DocumentProcessor::new(EngineConfig::default(), None, Some(test_logger()));

        let result = processor.process_document(&input, &open_profile(0.5));
        assert!(result.success);
        assert!(result.detections.is_empty());
        let output = result.output_path.as_ref().unwrap();
        // Without an engine the output is a byte-for-byte copy
        assert_eq!(
            crate::crypto::sha256_file(&input).unwrap(),
            crate::crypto::sha256_file(output).unwrap()
        );
    }

    #[test]
    fn test_validate_document_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "v.png");
        let processor = full_processor();

        let result = processor.process_document(&input, &open_profile(0.5));
        let log = result.audit_log.clone().unwrap();
        let output = result.output_path.clone().unwrap();
        assert!(processor.validate_document(&output, log));
    }

    #[test]
    fn test_statistics_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "s.png");
        let processor = full_processor();

        processor.process_document(&input, &open_profile(0.5));
        processor.process_document(Path::new("/missing.png"), &open_profile(0.5));

        let stats = processor.processing_statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);

        processor.reset_processing_statistics();
        assert_eq!(processor.processing_statistics().total, 0);
    }

    #[test]
    fn test_batch_with_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_png(dir.path(), name);
        }
        // A zero-byte document fails analysis
        std::fs::write(dir.path().join("zero.png"), b"").unwrap();

        let processor = full_processor();
        let batch = processor.batch_process(dir.path(), &open_profile(0.5), false, true);

        assert_eq!(batch.total_documents, 4);
        assert_eq!(batch.statistics.successful, 3);
        assert_eq!(batch.statistics.failed, 1);
        assert_eq!(batch.success_rate(), 75.0);
        let failed: Vec<_> = batch.results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].errors[0].contains("empty"));
    }

    #[test]
    fn test_batch_cancellation_marks_remainder() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            write_png(dir.path(), &format!("doc{}.png", i));
        }

        let processor = full_processor();
        // Cancel before starting: workers stop immediately and every
        // document is marked cancelled.
        processor.cancel_flag().cancel();
        let batch = processor.batch_process(dir.path(), &open_profile(0.5), false, true);

        assert_eq!(batch.total_documents, 6);
        assert_eq!(batch.statistics.cancelled, 6);
        assert!(batch
            .results
            .iter()
            .all(|r| r.status == ProcessingStatus::Cancelled));
    }

    #[test]
    fn test_stage_timeout_fails_document() {
        let dir = tempfile::tempdir().unwrap();
        // A large page keeps the detection stage busy past a zero deadline.
        let path = dir.path().join("big.png");
        let mut img = RgbImage::from_pixel(2048, 1024, Rgb([255u8, 255, 255]));
        for y in 300..620 {
            for x in 800..1100 {
                img.put_pixel(x, y, Rgb([0u8, 0, 0]));
            }
        }
        img.save(&path).unwrap();

        let mut config = EngineConfig::default();
        config.stage_timeout_ms = Some(0);
        let processor = DocumentProcessor::new(
            config.clone(),
            Some(HybridDetectionEngine::from_engine_config(&config)),
            None,
        );

        let result = processor.process_document(&path, &open_profile(0.5));
        assert_eq!(result.status, ProcessingStatus::Failed);
        assert!(result.errors[0].contains("timed out"));
        assert!(result.errors[0].contains("detect"));
    }

    #[test]
    fn test_health_check() {
        let processor = full_processor();
        let health = processor.health_check();
        assert_eq!(health["status"], json!("healthy"));
        assert_eq!(health["components"]["ai_engine"], json!(true));

        let degraded = DocumentProcessor::new(EngineConfig::default(), None, None);
        let health = degraded.health_check();
        assert_eq!(health["status"], json!("degraded"));
        assert_eq!(health["components"]["ai_engine"], json!(false));
        assert_eq!(health["components"]["audit_system"], json!(false));
    }

    #[test]
    fn test_enumerate_respects_recursion() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "top.png");
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        write_png(&sub, "deep.png");

        let processor = full_processor();
        assert_eq!(processor.enumerate_supported(dir.path(), false).len(), 1);
        assert_eq!(processor.enumerate_supported(dir.path(), true).len(), 2);
    }
}
