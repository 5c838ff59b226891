//! Profile merging, conflict detection, and conflict resolution.

use crate::error::{Error, Result};
use crate::models::profile::{ConflictStrategy, ProfileConflict, RedactionProfile};
use serde_json::json;
use std::collections::HashMap;

/// Threshold difference above which two profiles are considered in conflict.
const THRESHOLD_CONFLICT_DELTA: f64 = 0.1;

/// Overlay `child` onto `base`, producing the merged profile.
///
/// Rule maps: child keys override. Languages: set union. Threshold, style,
/// description: child wins. Custom rules and metadata: shallow merge with
/// child priority.
pub fn merge_into_child(base: RedactionProfile, child: RedactionProfile) -> RedactionProfile {
    let mut merged = base;

    for (k, v) in child.visual_rules {
        merged.visual_rules.insert(k, v);
    }
    for (k, v) in child.text_rules {
        merged.text_rules.insert(k, v);
    }

    for lang in child.multilingual_support {
        if !merged.multilingual_support.contains(&lang) {
            merged.multilingual_support.push(lang);
        }
    }

    merged.redaction_style = child.redaction_style;
    merged.confidence_threshold = child.confidence_threshold;
    if !child.description.is_empty() {
        merged.description = child.description;
    }
    if !child.version.is_empty() {
        merged.version = child.version;
    }

    for (k, v) in child.custom_rules {
        merged.custom_rules.insert(k, v);
    }
    for (k, v) in child.metadata {
        merged.metadata.insert(k, v);
    }

    merged.name = child.name;
    merged.inherits_from = child.inherits_from;
    merged
}

/// Report differences between two independent profiles.
///
/// Covers both rule maps, the redaction style, and threshold differences
/// above 0.1.
pub fn detect_conflicts(a: &RedactionProfile, b: &RedactionProfile) -> Vec<ProfileConflict> {
    let mut conflicts = Vec::new();

    rule_map_conflicts("visual_rules", &a.visual_rules, &b.visual_rules, &mut conflicts);
    rule_map_conflicts("text_rules", &a.text_rules, &b.text_rules, &mut conflicts);

    if a.redaction_style != b.redaction_style {
        conflicts.push(ProfileConflict {
            field: "redaction_style".to_string(),
            left: json!(a.redaction_style),
            right: json!(b.redaction_style),
        });
    }

    if (a.confidence_threshold - b.confidence_threshold).abs() > THRESHOLD_CONFLICT_DELTA {
        conflicts.push(ProfileConflict {
            field: "confidence_threshold".to_string(),
            left: json!(a.confidence_threshold),
            right: json!(b.confidence_threshold),
        });
    }

    conflicts
}

fn rule_map_conflicts(
    map_name: &str,
    left: &HashMap<String, bool>,
    right: &HashMap<String, bool>,
    conflicts: &mut Vec<ProfileConflict>,
) {
    for (key, &lv) in left {
        if let Some(&rv) = right.get(key) {
            if lv != rv {
                conflicts.push(ProfileConflict {
                    field: format!("{}.{}", map_name, key),
                    left: json!(lv),
                    right: json!(rv),
                });
            }
        }
    }
}

/// Merge two independent profiles under a conflict strategy.
///
/// `strict` fails on any conflict; `permissive` ORs rule maps and takes the
/// minimum threshold; `conservative` ANDs rule maps and takes the maximum
/// threshold.
pub fn resolve_conflicts(
    a: &RedactionProfile,
    b: &RedactionProfile,
    strategy: ConflictStrategy,
) -> Result<RedactionProfile> {
    let conflicts = detect_conflicts(a, b);

    if strategy == ConflictStrategy::Strict && !conflicts.is_empty() {
        let fields: Vec<&str> = conflicts.iter().map(|c| c.field.as_str()).collect();
        return Err(Error::ProfileConflict(format!(
            "profiles '{}' and '{}' conflict on: {}",
            a.name,
            b.name,
            fields.join(", ")
        )));
    }

    let combine = |x: bool, y: bool| match strategy {
        ConflictStrategy::Permissive => x || y,
        _ => x && y,
    };

    let mut merged = a.clone();
    merged.inherits_from.clear();

    for (key, &rv) in &b.visual_rules {
        let value = match merged.visual_rules.get(key) {
            Some(&lv) => combine(lv, rv),
            None => rv,
        };
        merged.visual_rules.insert(key.clone(), value);
    }
    for (key, &rv) in &b.text_rules {
        let value = match merged.text_rules.get(key) {
            Some(&lv) => combine(lv, rv),
            None => rv,
        };
        merged.text_rules.insert(key.clone(), value);
    }

    merged.confidence_threshold = match strategy {
        ConflictStrategy::Permissive => a.confidence_threshold.min(b.confidence_threshold),
        _ => a.confidence_threshold.max(b.confidence_threshold),
    };

    for lang in &b.multilingual_support {
        if !merged.multilingual_support.contains(lang) {
            merged.multilingual_support.push(lang.clone());
        }
    }
    for (k, v) in &b.custom_rules {
        merged.custom_rules.entry(k.clone()).or_insert_with(|| v.clone());
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::RedactionStyle;
    use pretty_assertions::assert_eq;

    fn profile(name: &str, face: Option<bool>, email: Option<bool>, threshold: f64) -> RedactionProfile {
        let mut p = RedactionProfile::named(name);
        if let Some(v) = face {
            p.visual_rules.insert("face".to_string(), v);
        }
        if let Some(v) = email {
            p.text_rules.insert("email".to_string(), v);
        }
        p.confidence_threshold = threshold;
        p
    }

    #[test]
    fn test_detect_conflicts() {
        let a = profile("a", Some(true), Some(true), 0.7);
        let b = profile("b", Some(false), Some(true), 0.85);

        let conflicts = detect_conflicts(&a, &b);
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.iter().any(|c| c.field == "visual_rules.face"));
        assert!(conflicts.iter().any(|c| c.field == "confidence_threshold"));
    }

    #[test]
    fn test_threshold_within_tolerance_is_not_conflict() {
        let a = profile("a", None, None, 0.7);
        let b = profile("b", None, None, 0.75);
        assert!(detect_conflicts(&a, &b).is_empty());
    }

    #[test]
    fn test_style_conflict() {
        let mut a = profile("a", None, None, 0.7);
        let mut b = profile("b", None, None, 0.7);
        a.redaction_style = RedactionStyle::SolidBlack;
        b.redaction_style = RedactionStyle::Blurred;
        let conflicts = detect_conflicts(&a, &b);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "redaction_style");
    }

    #[test]
    fn test_strict_fails_on_conflict() {
        let a = profile("a", Some(true), None, 0.7);
        let b = profile("b", Some(false), None, 0.7);
        let err = resolve_conflicts(&a, &b, ConflictStrategy::Strict).unwrap_err();
        assert!(matches!(err, Error::ProfileConflict(_)));
    }

    #[test]
    fn test_strict_merges_when_compatible() {
        let a = profile("a", Some(true), None, 0.7);
        let b = profile("b", None, Some(true), 0.7);
        let merged = resolve_conflicts(&a, &b, ConflictStrategy::Strict).unwrap();
        assert!(merged.visual_rules["face"]);
        assert!(merged.text_rules["email"]);
    }

    #[test]
    fn test_permissive_ors_and_takes_min_threshold() {
        let a = profile("a", Some(true), Some(false), 0.9);
        let b = profile("b", Some(false), Some(true), 0.6);

        let merged = resolve_conflicts(&a, &b, ConflictStrategy::Permissive).unwrap();
        assert!(merged.visual_rules["face"]);
        assert!(merged.text_rules["email"]);
        assert_eq!(merged.confidence_threshold, 0.6);
    }

    #[test]
    fn test_conservative_ands_and_takes_max_threshold() {
        let a = profile("a", Some(true), Some(true), 0.9);
        let b = profile("b", Some(false), Some(true), 0.6);

        let merged = resolve_conflicts(&a, &b, ConflictStrategy::Conservative).unwrap();
        assert!(!merged.visual_rules["face"]);
        assert!(merged.text_rules["email"]);
        assert_eq!(merged.confidence_threshold, 0.9);
    }

    #[test]
    fn test_merge_into_child_language_union() {
        let mut base = RedactionProfile::named("base");
        base.multilingual_support = vec!["en".to_string(), "hi".to_string()];
        let mut child = RedactionProfile::named("child");
        child.multilingual_support = vec!["hi".to_string(), "ta".to_string()];

        let merged = merge_into_child(base, child);
        assert_eq!(merged.multilingual_support, vec!["en", "hi", "ta"]);
        assert_eq!(merged.name, "child");
    }
}
