//! Integrity validation: compare document bytes to expected hashes and
//! verify audit records, producing issue-classified reports.

use crate::crypto::{self, verify_content_hash, VerifyingKeyHandle};
use crate::error::Result;
use crate::models::audit::AuditLog;
use crate::models::integrity::{IntegrityIssue, IntegrityReport, IntegrityStatus, IssueSeverity};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Clock skew tolerated on audit timestamps.
const TIMESTAMP_GRACE_SECONDS: i64 = 300;

/// Default threshold above which a document is flagged as unusually large.
const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Audit data accompanying a validation request.
pub enum AuditSource {
    /// An already-loaded audit record
    Record(Box<AuditLog>),
    /// A JSON file containing one audit record
    File(PathBuf),
}

/// Aggregated statistics over a batch of reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegritySummary {
    /// Reports aggregated
    pub total: usize,
    /// Counts keyed by overall result
    pub by_result: HashMap<String, usize>,
    /// Mean validation time in milliseconds
    pub average_processing_time_ms: f64,
    /// Reports whose audit record was signed
    pub signed: usize,
    /// Reports without a signature
    pub unsigned: usize,
}

/// Validates document bytes and audit records into [`IntegrityReport`]s.
pub struct IntegrityValidator {
    verifier: Option<VerifyingKeyHandle>,
    large_file_threshold: u64,
}

impl IntegrityValidator {
    /// Create a validator without signature verification capability.
    pub fn new() -> Self {
        Self {
            verifier: None,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }

    /// Create a validator that can verify signatures with a public key.
    pub fn with_verifier(verifier: VerifyingKeyHandle) -> Self {
        Self {
            verifier: Some(verifier),
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }

    /// Override the large-file warning threshold.
    pub fn with_large_file_threshold(mut self, threshold: u64) -> Self {
        self.large_file_threshold = threshold;
        self
    }

    /// Validate one document against an optional expected hash and optional
    /// audit data.
    pub fn validate(
        &self,
        document_path: &Path,
        expected_hash: Option<&str>,
        audit: Option<AuditSource>,
    ) -> IntegrityReport {
        let started = Instant::now();
        let document_id = document_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let mut report = IntegrityReport::new(document_id);

        // 1. Missing document short-circuits everything else.
        if !document_path.is_file() {
            report.overall_result = IntegrityStatus::MissingData;
            report.add_issue(
                IntegrityIssue::new(
                    "document_missing",
                    IssueSeverity::Error,
                    format!("document not found: {}", document_path.display()),
                    "document",
                )
                .with_recommendation("check the document path"),
            );
            report.processing_time_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        // 2. Size checks.
        if let Ok(meta) = std::fs::metadata(document_path) {
            let size = meta.len();
            report.metadata.insert("file_size".to_string(), json!(size));
            if size == 0 {
                report.add_issue(
                    IntegrityIssue::new(
                        "empty_file",
                        IssueSeverity::Warning,
                        "document is zero bytes",
                        "document",
                    )
                    .with_recommendation("re-acquire the document"),
                );
            } else if size > self.large_file_threshold {
                report.add_issue(IntegrityIssue::new(
                    "large_file",
                    IssueSeverity::Warning,
                    format!("document is {} bytes", size),
                    "document",
                ));
            }
        }

        // 3. Hash comparison.
        match crypto::sha256_file(document_path) {
            Ok(hash) => {
                report.document_hash = Some(hash.clone());
                if let Some(expected) = expected_hash {
                    report.expected_hash = Some(expected.to_string());
                    if expected != hash {
                        report.add_issue(
                            IntegrityIssue::new(
                                "hash_mismatch",
                                IssueSeverity::Error,
                                "document hash differs from the expected hash",
                                "document",
                            )
                            .with_detail("computed", hash)
                            .with_detail("expected", expected),
                        );
                    }
                }
            }
            Err(e) => {
                report.add_issue(IntegrityIssue::new(
                    "hash_unreadable",
                    IssueSeverity::Error,
                    format!("failed to hash document: {}", e),
                    "document",
                ));
            }
        }

        // 4. Audit record checks.
        if let Some(audit) = audit {
            self.check_audit(&mut report, document_path, audit);
        }

        // 5/6. Overall verdict from the collected issues.
        report.overall_result = overall_result(&report);
        report.processing_time_ms = started.elapsed().as_millis() as u64;
        debug!(
            "Integrity validation of {} finished: {}",
            document_path.display(),
            report.overall_result
        );
        report
    }

    /// Load, structurally validate, and cryptographically verify audit data.
    fn check_audit(&self, report: &mut IntegrityReport, document_path: &Path, audit: AuditSource) {
        let log = match audit {
            AuditSource::Record(log) => *log,
            AuditSource::File(path) => {
                match std::fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|text| AuditLog::from_json(&text).map_err(|e| e.to_string()))
                {
                    Ok(log) => log,
                    Err(e) => {
                        report.audit_trail_valid = Some(false);
                        report.add_issue(
                            IntegrityIssue::new(
                                "audit_log_load_failed",
                                IssueSeverity::Warning,
                                format!("audit log unreadable: {}", e),
                                "audit_log",
                            )
                            .with_detail("path", path.display().to_string()),
                        );
                        return;
                    }
                }
            }
        };

        let mut structurally_valid = true;

        if log.document_id.as_deref().unwrap_or("").is_empty() {
            structurally_valid = false;
            report.add_issue(IntegrityIssue::new(
                "missing_document_id",
                IssueSeverity::Error,
                "audit log carries no document_id",
                "audit_log",
            ));
        }

        let grace = Utc::now() + Duration::seconds(TIMESTAMP_GRACE_SECONDS);
        if log.timestamp > grace {
            structurally_valid = false;
            report.add_issue(
                IntegrityIssue::new(
                    "future_timestamp",
                    IssueSeverity::Error,
                    "audit log timestamp lies in the future",
                    "audit_log",
                )
                .with_detail("timestamp", log.timestamp.to_rfc3339()),
            );
        }

        // The first recorded file path should reference this document.
        if let Some(first) = log.file_paths.first() {
            let logged_name = Path::new(first).file_name().and_then(|n| n.to_str());
            let actual_name = document_path.file_name().and_then(|n| n.to_str());
            if logged_name.is_some() && logged_name != actual_name {
                structurally_valid = false;
                report.add_issue(
                    IntegrityIssue::new(
                        "file_path_mismatch",
                        IssueSeverity::Error,
                        "audit log references a different document",
                        "audit_log",
                    )
                    .with_detail("logged", first.clone()),
                );
            }
        }

        if let Some(signature) = log.signature.as_deref() {
            match &self.verifier {
                Some(verifier) => {
                    let verified = log
                        .content_hash()
                        .and_then(|hash| {
                            verify_content_hash(verifier.public_key(), &hash, signature)
                        })
                        .unwrap_or(false);
                    report.signature_valid = Some(verified);
                    if !verified {
                        report.add_issue(
                            IntegrityIssue::new(
                                "signature_invalid",
                                IssueSeverity::Error,
                                "audit signature failed verification",
                                "signature",
                            )
                            .with_recommendation("treat the audit record as untrusted"),
                        );
                    }
                }
                None => {
                    report.add_issue(IntegrityIssue::new(
                        "signature_unverifiable",
                        IssueSeverity::Warning,
                        "audit log is signed but no verification key is loaded",
                        "signature",
                    ));
                }
            }
        }

        report.audit_trail_valid = Some(structurally_valid);
    }

    /// Validate every file in a directory matching a glob pattern.
    ///
    /// When `audit_dir` is given, `<stem>_audit.json` beside each document
    /// supplies the audit record.
    pub fn validate_batch(
        &self,
        dir: &Path,
        audit_dir: Option<&Path>,
        file_pattern: &str,
    ) -> Result<Vec<IntegrityReport>> {
        let pattern = dir.join(file_pattern);
        let pattern = pattern.to_string_lossy();

        let mut reports = Vec::new();
        for entry in glob::glob(&pattern)
            .map_err(|e| crate::error::Error::Config(format!("bad file pattern: {}", e)))?
        {
            let Ok(path) = entry else { continue };
            if !path.is_file() {
                continue;
            }

            let audit = audit_dir.and_then(|adir| {
                let stem = path.file_stem()?.to_str()?;
                let candidate = adir.join(format!("{}_audit.json", stem));
                candidate.is_file().then(|| AuditSource::File(candidate))
            });

            reports.push(self.validate(&path, None, audit));
        }
        Ok(reports)
    }

    /// Aggregate a batch of reports.
    pub fn generate_summary(reports: &[IntegrityReport]) -> IntegritySummary {
        let mut by_result: HashMap<String, usize> = HashMap::new();
        let mut signed = 0;
        let mut total_time = 0u64;

        for report in reports {
            *by_result.entry(report.overall_result.to_string()).or_default() += 1;
            if report.signature_valid.is_some() {
                signed += 1;
            }
            total_time += report.processing_time_ms;
        }

        IntegritySummary {
            total: reports.len(),
            by_result,
            average_processing_time_ms: if reports.is_empty() {
                0.0
            } else {
                total_time as f64 / reports.len() as f64
            },
            signed,
            unsigned: reports.len() - signed,
        }
    }
}

impl Default for IntegrityValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Map collected issues to the most specific overall verdict.
fn overall_result(report: &IntegrityReport) -> IntegrityStatus {
    if !report.has_errors() {
        return IntegrityStatus::Valid;
    }
    let has = |t: &str| report.issues.iter().any(|i| i.issue_type == t);

    if has("document_missing") {
        IntegrityStatus::MissingData
    } else if has("hash_mismatch") {
        IntegrityStatus::HashMismatch
    } else if has("signature_invalid") {
        IntegrityStatus::SignatureMismatch
    } else if has("missing_document_id") || has("future_timestamp") || has("file_path_mismatch") {
        IntegrityStatus::AuditTrailInvalid
    } else {
        IntegrityStatus::Corrupted
    }
}
