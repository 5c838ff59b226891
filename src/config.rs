//! Engine configuration.
//!
//! Options are enumerated explicitly; loading from JSON rejects unknown keys
//! so that misspelled options fail loudly instead of silently falling back to
//! defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Default upper bound on accepted input size (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Configuration for the deidentification engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Upper bound on accepted input bytes
    pub max_file_size: u64,
    /// Whitelisted input extensions (lowercase, no dot)
    pub supported_formats: Vec<String>,
    /// Global floor on detection confidence
    pub min_confidence: f64,
    /// IoU threshold for merging same-type detections in the hybrid engine
    pub merge_iou: f64,
    /// IoU threshold for cross-engine validation
    pub cross_iou: f64,
    /// Per-type cap applied after ranking
    pub max_detections_per_type: usize,
    /// Confidence delta applied on cross-validation
    pub confidence_boost: f64,
    /// Audit cleanup horizon in days
    pub retention_days: u32,
    /// Whether audit signing keys are loaded at startup
    pub signing_enabled: bool,
    /// Whether audit logs are signed at insert time
    pub auto_sign: bool,
    /// Search path for profile files
    pub profiles_dir: Vec<PathBuf>,
    /// Root of persisted state (audit.db, signing keys, temp)
    pub storage_dir: PathBuf,
    /// Maximum concurrent documents in batch processing
    pub max_concurrency: usize,
    /// Size above which integrity validation records a warning
    pub large_file_threshold: u64,
    /// Optional per-stage deadline in milliseconds; exceeding it fails the
    /// document naming the stage
    pub stage_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            supported_formats: ["pdf", "png", "jpg", "jpeg", "tiff", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_confidence: 0.5,
            merge_iou: 0.5,
            cross_iou: 0.3,
            max_detections_per_type: 10,
            confidence_boost: 0.1,
            retention_days: 365,
            signing_enabled: true,
            auto_sign: true,
            profiles_dir: vec![PathBuf::from("profiles")],
            storage_dir: PathBuf::from("storage"),
            max_concurrency: 4,
            large_file_threshold: DEFAULT_MAX_FILE_SIZE,
            stage_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON value, rejecting unknown keys.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let config: EngineConfig = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("invalid engine configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_json_value(value)
    }

    /// Validate option ranges.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("min_confidence", self.min_confidence),
            ("merge_iou", self.merge_iou),
            ("cross_iou", self.cross_iou),
            ("confidence_boost", self.confidence_boost),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, v
                )));
            }
        }
        if self.max_file_size == 0 {
            return Err(Error::Config("max_file_size must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be positive".into()));
        }
        if self.supported_formats.is_empty() {
            return Err(Error::Config("supported_formats must not be empty".into()));
        }
        Ok(())
    }

    /// Check whether a file extension is whitelisted.
    pub fn is_supported_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.supported_formats.iter().any(|f| f == &ext)
    }

    /// Path of the audit database.
    pub fn audit_db_path(&self) -> PathBuf {
        self.storage_dir.join("audit.db")
    }

    /// Directory holding the signing key pair.
    pub fn signing_keys_dir(&self) -> PathBuf {
        self.storage_dir.join("signing_keys")
    }

    /// Directory for scoped temp files.
    pub fn temp_dir(&self) -> PathBuf {
        self.storage_dir.join("temp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.max_detections_per_type, 10);
        assert!(config.is_supported_extension("pdf"));
        assert!(config.is_supported_extension("PNG"));
        assert!(!config.is_supported_extension("docx"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = EngineConfig::from_json_value(json!({
            "min_confidence": 0.6,
            "definitely_not_an_option": true,
        }));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = EngineConfig::from_json_value(json!({ "merge_iou": 1.5 }));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json_value(json!({
            "min_confidence": 0.8,
            "retention_days": 30,
        }))
        .unwrap();
        assert_eq!(config.min_confidence, 0.8);
        assert_eq!(config.retention_days, 30);
        // Unspecified options keep defaults
        assert_eq!(config.merge_iou, 0.5);
    }

    #[test]
    fn test_storage_layout() {
        let config = EngineConfig::default();
        assert!(config.audit_db_path().ends_with("audit.db"));
        assert!(config.signing_keys_dir().ends_with("signing_keys"));
        assert!(config.temp_dir().ends_with("temp"));
    }
}
