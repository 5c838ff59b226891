//! Hybrid detection engine: dispatch, cross-validation, merging, filtering,
//! capping, and ranking over the CV and NLP sub-engines.

use crate::config::EngineConfig;
use crate::detection::{CvDetector, DetectionInput, NlpDetector, PIIDetector};
use crate::error::{Error, Result};
use crate::models::pii::{DetectionMethod, PIIDetection, PIIType};
use crate::models::profile::RedactionProfile;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Thresholds and caps for the hybrid pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridConfig {
    /// Global floor on detection confidence
    pub min_confidence: f64,
    /// IoU threshold for merging detections
    pub merge_iou: f64,
    /// IoU threshold for cross-engine validation
    pub cross_iou: f64,
    /// Confidence delta applied to cross-validated pairs
    pub confidence_boost: f64,
    /// Per-type cap applied after ranking
    pub max_detections_per_type: usize,
    /// Whether cross-validation runs at all
    pub enable_cross_validation: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            merge_iou: 0.5,
            cross_iou: 0.3,
            confidence_boost: 0.1,
            max_detections_per_type: 10,
            enable_cross_validation: true,
        }
    }
}

impl From<&EngineConfig> for HybridConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            merge_iou: config.merge_iou,
            cross_iou: config.cross_iou,
            confidence_boost: config.confidence_boost,
            max_detections_per_type: config.max_detections_per_type,
            enable_cross_validation: true,
        }
    }
}

/// Composes the CV and NLP sub-engines; either may be disabled.
///
/// Sub-engine faults are logged and swallowed: an error from one engine
/// never aborts the other.
pub struct HybridDetectionEngine {
    cv: Option<Box<dyn PIIDetector>>,
    nlp: Option<Box<dyn PIIDetector>>,
    config: HybridConfig,
}

impl HybridDetectionEngine {
    /// Compose explicit sub-engines.
    pub fn new(
        cv: Option<Box<dyn PIIDetector>>,
        nlp: Option<Box<dyn PIIDetector>>,
        config: HybridConfig,
    ) -> Self {
        Self { cv, nlp, config }
    }

    /// Both default sub-engines with thresholds from the engine config.
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self {
            cv: Some(Box::new(CvDetector::new())),
            nlp: Some(Box::new(NlpDetector::new())),
            config: HybridConfig::from(config),
        }
    }

    /// Whether at least one sub-engine is enabled.
    pub fn has_engines(&self) -> bool {
        self.cv.is_some() || self.nlp.is_some()
    }

    /// Run the full pipeline; the profile threshold tightens the global
    /// confidence floor when higher.
    pub fn detect(
        &self,
        input: &DetectionInput,
        profile: Option<&RedactionProfile>,
    ) -> Vec<PIIDetection> {
        let mut detections = self.dispatch(input);

        if self.config.enable_cross_validation {
            self.cross_validate(&mut detections);
        }
        let mut detections = self.merge(detections);

        let mut threshold = self.config.min_confidence;
        if let Some(profile) = profile {
            threshold = threshold.max(profile.confidence_threshold);
        }
        // A detection exactly at the threshold is kept.
        detections.retain(|d| d.confidence >= threshold);

        let mut detections = self.cap_per_type(detections);
        detections.sort_by(|a, b| b.ranking_score().total_cmp(&a.ranking_score()));
        detections
    }

    /// Route the input to the sub-engines by modality.
    fn dispatch(&self, input: &DetectionInput) -> Vec<PIIDetection> {
        let mut detections = Vec::new();

        let run_cv = !matches!(input, DetectionInput::Text(_));
        let run_nlp = !matches!(input, DetectionInput::Image(_));

        if run_cv {
            if let Some(cv) = &self.cv {
                match cv.detect_pii(input) {
                    Ok(found) => detections.extend(found),
                    Err(e) => warn!("CV engine failed, continuing without it: {}", e),
                }
            }
        }
        if run_nlp {
            if let Some(nlp) = &self.nlp {
                match nlp.detect_pii(input) {
                    Ok(found) => detections.extend(found),
                    Err(e) => warn!("NLP engine failed, continuing without it: {}", e),
                }
            }
        }

        debug!("Hybrid dispatch produced {} raw detections", detections.len());
        detections
    }

    /// Boost spatially correlated cross-engine pairs with compatible types.
    fn cross_validate(&self, detections: &mut [PIIDetection]) {
        let boost = self.config.confidence_boost;

        for i in 0..detections.len() {
            for j in (i + 1)..detections.len() {
                let (a, b) = (&detections[i], &detections[j]);
                if a.page_number != b.page_number {
                    continue;
                }
                let cross_engine = matches!(
                    (a.detection_method, b.detection_method),
                    (DetectionMethod::Cv, DetectionMethod::Nlp)
                        | (DetectionMethod::Nlp, DetectionMethod::Cv)
                );
                if !cross_engine {
                    continue;
                }
                if a.bounding_box.iou(&b.bounding_box) < self.config.cross_iou {
                    continue;
                }
                if !types_compatible(a.pii_type, b.pii_type) && !texts_correlate(a, b) {
                    continue;
                }

                for k in [i, j] {
                    let d = &mut detections[k];
                    d.confidence = (d.confidence + boost).min(1.0);
                    d.metadata.insert("cross_validated".to_string(), json!(true));
                }
            }
        }
    }

    /// Merge cross-validated pairs and same-type clusters.
    fn merge(&self, detections: Vec<PIIDetection>) -> Vec<PIIDetection> {
        let merge_iou = self.config.merge_iou;
        let mut merged: Vec<PIIDetection> = Vec::with_capacity(detections.len());

        for detection in detections {
            let partner = merged.iter_mut().find(|m| {
                m.page_number == detection.page_number
                    && m.bounding_box.iou(&detection.bounding_box) >= merge_iou
                    && (m.pii_type == detection.pii_type
                        || (is_cross_validated(m) && is_cross_validated(&detection)))
            });

            match partner {
                Some(existing) => {
                    let mut combined = existing.merge_with(&detection);
                    combined
                        .metadata
                        .insert("hybrid_merged".to_string(), json!(true));
                    *existing = combined;
                }
                None => merged.push(detection),
            }
        }

        merged
    }

    /// Keep the top N detections of each type by confidence.
    fn cap_per_type(&self, detections: Vec<PIIDetection>) -> Vec<PIIDetection> {
        let cap = self.config.max_detections_per_type;
        let mut by_type: HashMap<PIIType, Vec<PIIDetection>> = HashMap::new();
        for d in detections {
            by_type.entry(d.pii_type).or_default().push(d);
        }

        let mut kept = Vec::new();
        for (_, mut group) in by_type {
            group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            group.truncate(cap);
            kept.extend(group);
        }
        kept
    }
}

impl PIIDetector for HybridDetectionEngine {
    fn detect_pii(&self, input: &DetectionInput) -> Result<Vec<PIIDetection>> {
        Ok(self.detect(input, None))
    }

    fn supported_types(&self) -> Vec<PIIType> {
        let mut types = Vec::new();
        if let Some(cv) = &self.cv {
            types.extend(cv.supported_types());
        }
        if let Some(nlp) = &self.nlp {
            for t in nlp.supported_types() {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
        }
        types
    }

    fn configure(&mut self, options: Value) -> Result<()> {
        self.config = serde_json::from_value(options)
            .map_err(|e| Error::Config(format!("invalid hybrid configuration: {}", e)))?;
        Ok(())
    }

    fn model_info(&self) -> HashMap<String, Value> {
        let mut info = HashMap::from([
            ("engine".to_string(), json!("hybrid")),
            ("cv_enabled".to_string(), json!(self.cv.is_some())),
            ("nlp_enabled".to_string(), json!(self.nlp.is_some())),
        ]);
        if let Some(cv) = &self.cv {
            info.insert("cv".to_string(), json!(cv.model_info()));
        }
        if let Some(nlp) = &self.nlp {
            info.insert("nlp".to_string(), json!(nlp.model_info()));
        }
        info
    }
}

/// Cross-engine type pairs treated as evidence for the same entity.
fn types_compatible(a: PIIType, b: PIIType) -> bool {
    matches!(
        (a, b),
        (PIIType::Face, PIIType::Name)
            | (PIIType::Name, PIIType::Face)
            | (PIIType::Signature, PIIType::Name)
            | (PIIType::Name, PIIType::Signature)
    )
}

/// Text correlation also counts as compatibility evidence.
fn texts_correlate(a: &PIIDetection, b: &PIIDetection) -> bool {
    match (&a.text_content, &b.text_content) {
        (Some(ta), Some(tb)) if ta.len() >= 3 && tb.len() >= 3 => {
            let (ta, tb) = (ta.to_lowercase(), tb.to_lowercase());
            ta.contains(&tb) || tb.contains(&ta)
        }
        _ => false,
    }
}

fn is_cross_validated(d: &PIIDetection) -> bool {
    matches!(d.metadata.get("cross_validated"), Some(Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::TextInput;
    use crate::models::pii::BoundingBox;
    use pretty_assertions::assert_eq;

    /// A sub-engine returning canned detections.
    struct FixedDetector {
        detections: Vec<PIIDetection>,
        types: Vec<PIIType>,
    }

    impl PIIDetector for FixedDetector {
        fn detect_pii(&self, _input: &DetectionInput) -> Result<Vec<PIIDetection>> {
            Ok(self.detections.clone())
        }
        fn supported_types(&self) -> Vec<PIIType> {
            self.types.clone()
        }
        fn configure(&mut self, _options: Value) -> Result<()> {
            Ok(())
        }
        fn model_info(&self) -> HashMap<String, Value> {
            HashMap::new()
        }
    }

    /// A sub-engine that always errors.
    struct FailingDetector;

    impl PIIDetector for FailingDetector {
        fn detect_pii(&self, _input: &DetectionInput) -> Result<Vec<PIIDetection>> {
            Err(Error::Internal("inference backend crashed".into()))
        }
        fn supported_types(&self) -> Vec<PIIType> {
            vec![PIIType::Face]
        }
        fn configure(&mut self, _options: Value) -> Result<()> {
            Ok(())
        }
        fn model_info(&self) -> HashMap<String, Value> {
            HashMap::new()
        }
    }

    fn detection(
        pii_type: PIIType,
        bbox: (u32, u32, u32, u32),
        confidence: f64,
        method: DetectionMethod,
    ) -> PIIDetection {
        PIIDetection::new(
            pii_type,
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3).unwrap(),
            confidence,
            0,
            method,
        )
        .unwrap()
    }

    fn structured_input() -> DetectionInput {
        DetectionInput::Structured {
            image: None,
            text: Some(TextInput::plain("")),
        }
    }

    #[test]
    fn test_cross_validation_boost_and_merge() {
        // A face over a printed name with IoU 0.6: boosted and merged into
        // one hybrid detection.
        let cv = FixedDetector {
            detections: vec![detection(PIIType::Face, (0, 0, 100, 100), 0.8, DetectionMethod::Cv)],
            types: vec![PIIType::Face],
        };
        // 100x100 vs shifted box for IoU 0.6: overlap 75x80 = 6000? Use a
        // contained box: (0,0,100,60) IoU = 6000/10000 = 0.6
        let nlp = FixedDetector {
            detections: vec![detection(PIIType::Name, (0, 0, 100, 60), 0.7, DetectionMethod::Nlp)],
            types: vec![PIIType::Name],
        };

        let engine = HybridDetectionEngine::new(
            Some(Box::new(cv)),
            Some(Box::new(nlp)),
            HybridConfig::default(),
        );

        let result = engine.detect(&structured_input(), None);
        assert_eq!(result.len(), 1);
        let merged = &result[0];
        assert!(merged.confidence >= 0.9);
        assert_eq!(merged.metadata["cross_validated"], json!(true));
        assert_eq!(merged.metadata["hybrid_merged"], json!(true));
        assert_eq!(merged.detection_method, DetectionMethod::Hybrid);
        assert_eq!(merged.pii_type, PIIType::Face);
    }

    #[test]
    fn test_incompatible_types_not_boosted() {
        let cv = FixedDetector {
            detections: vec![detection(PIIType::QrCode, (0, 0, 100, 100), 0.8, DetectionMethod::Cv)],
            types: vec![PIIType::QrCode],
        };
        let nlp = FixedDetector {
            detections: vec![detection(PIIType::Ssn, (0, 0, 100, 60), 0.7, DetectionMethod::Nlp)],
            types: vec![PIIType::Ssn],
        };

        let engine = HybridDetectionEngine::new(
            Some(Box::new(cv)),
            Some(Box::new(nlp)),
            HybridConfig::default(),
        );

        let result = engine.detect(&structured_input(), None);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|d| !is_cross_validated(d)));
    }

    #[test]
    fn test_sub_engine_failure_is_soft() {
        let nlp = FixedDetector {
            detections: vec![detection(PIIType::Email, (0, 0, 50, 20), 0.9, DetectionMethod::Nlp)],
            types: vec![PIIType::Email],
        };

        let engine = HybridDetectionEngine::new(
            Some(Box::new(FailingDetector)),
            Some(Box::new(nlp)),
            HybridConfig::default(),
        );

        // The CV failure must not abort the NLP engine.
        let result = engine.detect(&structured_input(), None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pii_type, PIIType::Email);
    }

    #[test]
    fn test_same_type_merging() {
        let nlp = FixedDetector {
            detections: vec![
                detection(PIIType::Email, (0, 0, 100, 20), 0.9, DetectionMethod::Nlp),
                detection(PIIType::Email, (5, 0, 100, 20), 0.6, DetectionMethod::Nlp),
            ],
            types: vec![PIIType::Email],
        };

        let engine =
            HybridDetectionEngine::new(None, Some(Box::new(nlp)), HybridConfig::default());
        let result = engine.detect(&structured_input(), None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].confidence, 0.9);
        assert_eq!(result[0].metadata["hybrid_merged"], json!(true));
    }

    #[test]
    fn test_confidence_filtering_threshold_inclusive() {
        let mut profile = RedactionProfile::named("strict");
        profile.confidence_threshold = 0.8;

        let nlp = FixedDetector {
            detections: vec![
                detection(PIIType::Email, (0, 0, 50, 20), 0.8, DetectionMethod::Nlp),
                detection(PIIType::Phone, (0, 40, 50, 60), 0.799, DetectionMethod::Nlp),
            ],
            types: vec![PIIType::Email, PIIType::Phone],
        };

        let engine =
            HybridDetectionEngine::new(None, Some(Box::new(nlp)), HybridConfig::default());
        let result = engine.detect(&structured_input(), Some(&profile));

        // Exactly at the threshold is kept; epsilon below is dropped.
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pii_type, PIIType::Email);
    }

    #[test]
    fn test_per_type_cap() {
        let detections: Vec<PIIDetection> = (0..15)
            .map(|i| {
                detection(
                    PIIType::Email,
                    (0, i * 30, 50, i * 30 + 20),
                    0.5 + i as f64 * 0.01,
                    DetectionMethod::Nlp,
                )
            })
            .collect();
        let nlp = FixedDetector {
            detections,
            types: vec![PIIType::Email],
        };

        let mut config = HybridConfig::default();
        config.max_detections_per_type = 10;
        let engine = HybridDetectionEngine::new(None, Some(Box::new(nlp)), config);

        let result = engine.detect(&structured_input(), None);
        assert_eq!(result.len(), 10);
        // The weakest five were dropped
        assert!(result.iter().all(|d| d.confidence >= 0.55));
    }

    #[test]
    fn test_ranking_order() {
        let nlp = FixedDetector {
            detections: vec![
                detection(PIIType::Email, (0, 0, 50, 20), 0.85, DetectionMethod::Nlp),
                // Sensitive type ranks above a slightly more confident plain one
                detection(PIIType::Ssn, (0, 40, 50, 60), 0.8, DetectionMethod::Nlp),
            ],
            types: vec![PIIType::Email, PIIType::Ssn],
        };

        let engine =
            HybridDetectionEngine::new(None, Some(Box::new(nlp)), HybridConfig::default());
        let result = engine.detect(&structured_input(), None);
        assert_eq!(result[0].pii_type, PIIType::Ssn);
    }

    #[test]
    fn test_supported_types_union() {
        let engine = HybridDetectionEngine::from_engine_config(&EngineConfig::default());
        let types = engine.supported_types();
        assert!(types.contains(&PIIType::Face));
        assert!(types.contains(&PIIType::Email));
    }

    #[test]
    fn test_disabled_engines_yield_empty() {
        let engine = HybridDetectionEngine::new(None, None, HybridConfig::default());
        assert!(!engine.has_engines());
        assert!(engine.detect(&structured_input(), None).is_empty());
    }
}
