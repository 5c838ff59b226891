//! Placeholder-based text replacement.
//!
//! Used when the consumer works on extracted text rather than pixels: each
//! detection's text is replaced by a type-specific literal placeholder,
//! overridable through the profile's custom rules.

use crate::models::pii::{PIIDetection, PIIType};
use crate::models::profile::RedactionProfile;
use std::collections::HashMap;

/// Placeholder text per PII type under a profile.
pub fn placeholder_map(profile: &RedactionProfile) -> HashMap<PIIType, String> {
    PIIType::all()
        .iter()
        .map(|&t| (t, profile.replacement_text_for(t)))
        .collect()
}

/// Replace every detection's text content with its placeholder.
///
/// Detections without text content are ignored. Longer texts are replaced
/// first so that a detection nested in another's text cannot corrupt the
/// outer replacement.
pub fn redact_text(text: &str, detections: &[PIIDetection], profile: &RedactionProfile) -> String {
    let mut targets: Vec<(&str, PIIType)> = detections
        .iter()
        .filter(|d| profile.is_type_enabled(d.pii_type))
        .filter_map(|d| d.text_content.as_deref().map(|t| (t, d.pii_type)))
        .filter(|(t, _)| !t.is_empty())
        .collect();
    targets.sort_by_key(|(t, _)| std::cmp::Reverse(t.len()));

    let mut result = text.to_string();
    for (target, pii_type) in targets {
        let placeholder = profile.replacement_text_for(pii_type);
        result = result.replace(target, &placeholder);
    }
    result
}
