//! Redaction engine: coordinate-accurate, layout-preserving redaction of
//! PDF and raster documents.

mod pdf;
mod raster;
mod text;

pub use pdf::redact_pdf;
pub use raster::redact_raster;
pub use text::{placeholder_map, redact_text};

use crate::error::{Error, ProcessingStage, Result};
use crate::models::document::DocumentFormat;
use crate::models::pii::{PIIDetection, PIIDetectionCollection};
use crate::models::profile::RedactionProfile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix applied to redacted output file names.
pub const REDACTED_PREFIX: &str = "redacted_";

/// Counters describing one redaction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RedactionStats {
    /// Detections handed to the engine
    pub total_detections: usize,
    /// Detections actually redacted
    pub redacted_detections: usize,
    /// Detections skipped by profile rules, threshold, or page range
    pub skipped_detections: usize,
    /// Redacted counts keyed by PII type name
    pub by_type: HashMap<String, usize>,
    /// Redacted counts keyed by page
    pub by_page: HashMap<u32, usize>,
    /// Style used for the run
    pub style: String,
}

/// Output of one redaction run.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionOutcome {
    /// Path of the redacted document
    pub output_path: PathBuf,
    /// Run counters
    pub stats: RedactionStats,
    /// Per-page non-fatal problems
    pub warnings: Vec<String>,
}

/// Applies style-specific redactions per document format.
pub struct RedactionEngine;

impl RedactionEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }

    /// Redaction never reflows or rewrites surviving content.
    pub fn preserve_layout(&self) -> bool {
        true
    }

    /// Apply profile-filtered redactions to a document, writing the result
    /// to a sibling path prefixed with `redacted_`.
    pub fn apply_redactions(
        &self,
        document_path: &Path,
        detections: &PIIDetectionCollection,
        profile: &RedactionProfile,
    ) -> Result<RedactionOutcome> {
        let format = DocumentFormat::from_path(document_path);
        let output_path = redacted_output_path(document_path);

        let mut stats = RedactionStats {
            total_detections: detections.len(),
            style: profile.redaction_style.to_string(),
            ..Default::default()
        };
        let mut warnings = Vec::new();

        // Only detections the profile enables at or above its threshold.
        let eligible: Vec<&PIIDetection> = detections
            .detections
            .iter()
            .filter(|d| {
                profile.is_type_enabled(d.pii_type)
                    && d.confidence >= profile.confidence_threshold
            })
            .collect();

        // Group by page; pages are processed in order.
        let mut by_page: BTreeMap<u32, Vec<&PIIDetection>> = BTreeMap::new();
        for d in eligible {
            by_page.entry(d.page_number).or_default().push(d);
        }

        let redacted = match format {
            DocumentFormat::Pdf => {
                redact_pdf(document_path, &output_path, &by_page, profile, &mut warnings)?
            }
            f if f.is_raster() => {
                redact_raster(document_path, &output_path, &by_page, profile, &mut warnings)?
            }
            _ => {
                return Err(Error::document_processing(
                    ProcessingStage::Redact,
                    document_path.display().to_string(),
                    "unsupported format",
                ))
            }
        };

        for d in &redacted {
            *stats.by_type.entry(d.pii_type.as_str().to_string()).or_default() += 1;
            *stats.by_page.entry(d.page_number).or_default() += 1;
        }
        stats.redacted_detections = redacted.len();
        stats.skipped_detections = stats.total_detections - stats.redacted_detections;

        for w in &warnings {
            warn!("Redaction warning for {}: {}", document_path.display(), w);
        }
        debug!(
            "Redacted {} of {} detections into {}",
            stats.redacted_detections,
            stats.total_detections,
            output_path.display()
        );

        Ok(RedactionOutcome {
            output_path,
            stats,
            warnings,
        })
    }
}

impl Default for RedactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Sibling path with the `redacted_` prefix, preserving the extension.
pub fn redacted_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}{}", REDACTED_PREFIX, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pii::{BoundingBox, DetectionMethod, PIIType};
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn image_doc(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([255u8, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn email_profile(threshold: f64) -> RedactionProfile {
        let mut p = RedactionProfile::named("emails");
        p.text_rules.insert("email".to_string(), true);
        p.confidence_threshold = threshold;
        p
    }

    fn email_detection(bbox: (u32, u32, u32, u32), confidence: f64, page: u32) -> PIIDetection {
        PIIDetection::new(
            PIIType::Email,
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3).unwrap(),
            confidence,
            page,
            DetectionMethod::Nlp,
        )
        .unwrap()
    }

    #[test]
    fn test_output_path_prefix() {
        let out = redacted_output_path(Path::new("/docs/scan.png"));
        assert_eq!(out, PathBuf::from("/docs/redacted_scan.png"));
    }

    #[test]
    fn test_profile_filtering_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let input = image_doc(dir.path(), "scan.png", 200, 200);

        let mut detections = PIIDetectionCollection::new();
        detections.add(email_detection((10, 10, 60, 30), 0.9, 0)); // redacted
        detections.add(email_detection((10, 50, 60, 70), 0.3, 0)); // below threshold
        let mut ssn = email_detection((10, 90, 60, 110), 0.9, 0);
        ssn.pii_type = PIIType::Ssn; // type not enabled
        detections.add(ssn);

        let outcome = RedactionEngine::new()
            .apply_redactions(&input, &detections, &email_profile(0.7))
            .unwrap();

        assert!(outcome.output_path.exists());
        assert_eq!(outcome.stats.total_detections, 3);
        assert_eq!(outcome.stats.redacted_detections, 1);
        assert_eq!(outcome.stats.skipped_detections, 2);
        assert_eq!(outcome.stats.by_type["email"], 1);
        assert_eq!(outcome.stats.by_page[&0], 1);
    }

    #[test]
    fn test_threshold_equality_is_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let input = image_doc(dir.path(), "eq.png", 100, 100);

        let mut detections = PIIDetectionCollection::new();
        detections.add(email_detection((10, 10, 60, 30), 0.7, 0));

        let outcome = RedactionEngine::new()
            .apply_redactions(&input, &detections, &email_profile(0.7))
            .unwrap();
        assert_eq!(outcome.stats.redacted_detections, 1);
    }

    #[test]
    fn test_out_of_range_page_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let input = image_doc(dir.path(), "one_page.png", 100, 100);

        let mut detections = PIIDetectionCollection::new();
        detections.add(email_detection((10, 10, 60, 30), 0.9, 0));
        detections.add(email_detection((10, 10, 60, 30), 0.9, 7)); // no such page

        let outcome = RedactionEngine::new()
            .apply_redactions(&input, &detections, &email_profile(0.5))
            .unwrap();
        assert_eq!(outcome.stats.redacted_detections, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("page 7"));
    }

    #[test]
    fn test_output_differs_from_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = image_doc(dir.path(), "diff.png", 100, 100);

        let mut detections = PIIDetectionCollection::new();
        detections.add(email_detection((10, 10, 60, 30), 0.9, 0));

        let outcome = RedactionEngine::new()
            .apply_redactions(&input, &detections, &email_profile(0.5))
            .unwrap();

        let original = crate::crypto::sha256_file(&input).unwrap();
        let redacted = crate::crypto::sha256_file(&outcome.output_path).unwrap();
        assert_ne!(original, redacted);
    }

    #[test]
    fn test_unsupported_format_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, b"nope").unwrap();

        let err = RedactionEngine::new()
            .apply_redactions(&path, &PIIDetectionCollection::new(), &email_profile(0.5))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DocumentProcessing { stage: ProcessingStage::Redact, .. }
        ));
    }
}
