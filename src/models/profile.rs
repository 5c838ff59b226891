//! Redaction profiles: rule sets selecting what is redacted and how.

use crate::error::Result;
use crate::models::pii::PIIType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Redaction rendering styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedactionStyle {
    /// Opaque black fill
    #[default]
    SolidBlack,
    /// Opaque white fill
    SolidWhite,
    /// Coarse mosaic of the underlying region
    Pixelated,
    /// Gaussian blur of the underlying region
    Blurred,
    /// Cross-hatch pattern fill
    Pattern,
}

impl std::fmt::Display for RedactionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SolidBlack => "solid_black",
            Self::SolidWhite => "solid_white",
            Self::Pixelated => "pixelated",
            Self::Blurred => "blurred",
            Self::Pattern => "pattern",
        };
        write!(f, "{}", s)
    }
}

/// Strategy for resolving conflicts between two independent profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Any conflict is an error
    Strict,
    /// Logical OR across rule maps; minimum threshold wins
    Permissive,
    /// Logical AND across rule maps; maximum threshold wins
    Conservative,
}

/// A single difference between two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConflict {
    /// Dotted field path, e.g. `visual_rules.face`
    pub field: String,
    /// Value in the first profile
    pub left: Value,
    /// Value in the second profile
    pub right: Value,
}

/// A versioned, possibly inherited rule set controlling redaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionProfile {
    /// Profile name, used for discovery and inheritance references
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Per-type switches for visual PII
    pub visual_rules: HashMap<String, bool>,
    /// Per-type switches for text PII
    pub text_rules: HashMap<String, bool>,
    /// Rendering style for redacted regions
    pub redaction_style: RedactionStyle,
    /// Language codes the profile expects in inputs
    pub multilingual_support: Vec<String>,
    /// Minimum confidence for a detection to be redacted
    pub confidence_threshold: f64,
    /// Free-form per-type extensions (e.g. replacement text)
    pub custom_rules: HashMap<String, Value>,
    /// Parent profile names, resolved depth-first
    pub inherits_from: Vec<String>,
    /// Profile schema version
    pub version: String,
    /// Arbitrary metadata
    pub metadata: HashMap<String, Value>,
}

impl Default for RedactionProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            visual_rules: HashMap::new(),
            text_rules: HashMap::new(),
            redaction_style: RedactionStyle::SolidBlack,
            multilingual_support: Vec::new(),
            confidence_threshold: 0.7,
            custom_rules: HashMap::new(),
            inherits_from: Vec::new(),
            version: "1.0".to_string(),
            metadata: HashMap::new(),
        }
    }
}

impl RedactionProfile {
    /// Create a named profile with defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether a PII type is enabled for redaction.
    ///
    /// Visual rules are consulted first, then text rules; an unlisted type is
    /// disabled.
    pub fn is_type_enabled(&self, pii_type: PIIType) -> bool {
        let key = pii_type.as_str();
        if let Some(&enabled) = self.visual_rules.get(key) {
            return enabled;
        }
        if let Some(&enabled) = self.text_rules.get(key) {
            return enabled;
        }
        false
    }

    /// Placeholder text for a redacted type.
    ///
    /// `custom_rules[type].replacement_text` overrides the built-in
    /// `[<TYPE> REDACTED]` form.
    pub fn replacement_text_for(&self, pii_type: PIIType) -> String {
        if let Some(rule) = self.custom_rules.get(pii_type.as_str()) {
            if let Some(text) = rule.get("replacement_text").and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
        match pii_type {
            PIIType::Name => "[NAME REDACTED]".to_string(),
            PIIType::Email => "[EMAIL REDACTED]".to_string(),
            PIIType::Phone => "[PHONE REDACTED]".to_string(),
            PIIType::Address => "[ADDRESS REDACTED]".to_string(),
            PIIType::Ssn => "[SSN REDACTED]".to_string(),
            PIIType::CreditCard => "[CARD REDACTED]".to_string(),
            PIIType::DateOfBirth => "[DOB REDACTED]".to_string(),
            PIIType::IpAddress => "[IP REDACTED]".to_string(),
            _ => "[REDACTED]".to_string(),
        }
    }

    /// Validate the profile, returning one message per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("profile name must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            errors.push(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.inherits_from.iter().any(|p| p == &self.name) {
            errors.push(format!("profile '{}' cannot inherit from itself", self.name));
        }
        for (map_name, rules) in [("visual_rules", &self.visual_rules), ("text_rules", &self.text_rules)] {
            for key in rules.keys() {
                if PIIType::parse(key).is_none() {
                    errors.push(format!("{} references unknown PII type '{}'", map_name, key));
                }
            }
        }

        errors
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save as YAML.
    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Save as JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
