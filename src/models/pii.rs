//! PII detection types: bounding boxes, detections, and collections.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Default IoU threshold above which two same-type detections are duplicates.
pub const DEFAULT_DUPLICATE_IOU: f64 = 0.5;

/// Types of personally-identifiable information the engine can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PIIType {
    // Visual types
    /// Human face
    Face,
    /// Handwritten signature
    Signature,
    /// Linear barcode
    Barcode,
    /// QR code
    QrCode,
    // Text types
    /// Person name
    Name,
    /// E-mail address
    Email,
    /// Phone number
    Phone,
    /// Postal address
    Address,
    /// Social security number
    Ssn,
    /// Government or organization ID number
    IdNumber,
    /// Credit card number
    CreditCard,
    /// Date of birth
    DateOfBirth,
    /// IP address
    IpAddress,
}

impl PIIType {
    /// All known PII types.
    pub fn all() -> &'static [PIIType] {
        &[
            Self::Face,
            Self::Signature,
            Self::Barcode,
            Self::QrCode,
            Self::Name,
            Self::Email,
            Self::Phone,
            Self::Address,
            Self::Ssn,
            Self::IdNumber,
            Self::CreditCard,
            Self::DateOfBirth,
            Self::IpAddress,
        ]
    }

    /// Whether this type is detected visually (CV engine).
    pub fn is_visual(&self) -> bool {
        matches!(self, Self::Face | Self::Signature | Self::Barcode | Self::QrCode)
    }

    /// Whether this type is detected from text (NLP engine).
    pub fn is_text(&self) -> bool {
        !self.is_visual()
    }

    /// Whether this type is flagged sensitive, enabling ranking boosts.
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Self::Ssn | Self::CreditCard | Self::DateOfBirth | Self::Face | Self::Signature
        )
    }

    /// Snake-case name used in rule maps and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Signature => "signature",
            Self::Barcode => "barcode",
            Self::QrCode => "qr_code",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Ssn => "ssn",
            Self::IdNumber => "id_number",
            Self::CreditCard => "credit_card",
            Self::DateOfBirth => "date_of_birth",
            Self::IpAddress => "ip_address",
        }
    }

    /// Parse a snake-case type name.
    pub fn parse(s: &str) -> Option<PIIType> {
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for PIIType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a detection was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Computer vision engine
    Cv,
    /// Text analysis engine
    Nlp,
    /// Merged or cross-validated across engines
    Hybrid,
    /// Human-supplied
    Manual,
    /// Provenance unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cv => "cv",
            Self::Nlp => "nlp",
            Self::Hybrid => "hybrid",
            Self::Manual => "manual",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Integer rectangle in page pixel coordinates.
///
/// Invariants: `0 <= x1 < x2` and `0 <= y1 < y2`. Serialization includes the
/// derived width/height/area/center so consumers do not recompute them;
/// deserialization reads only the corner coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Build a box, enforcing the corner invariants.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(Error::Internal(format!(
                "invalid bounding box ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Box width in pixels.
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    /// Box height in pixels.
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Box area in square pixels.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (u32, u32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// Intersection-over-union with another box, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }

        let intersection = (ix2 - ix1) as u64 * (iy2 - iy1) as u64;
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Expand by `margin` on every side, clamping at zero.
    pub fn expand(&self, margin: u32) -> BoundingBox {
        BoundingBox {
            x1: self.x1.saturating_sub(margin),
            y1: self.y1.saturating_sub(margin),
            x2: self.x2 + margin,
            y2: self.y2 + margin,
        }
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("BoundingBox", 8)?;
        s.serialize_field("x1", &self.x1)?;
        s.serialize_field("y1", &self.y1)?;
        s.serialize_field("x2", &self.x2)?;
        s.serialize_field("y2", &self.y2)?;
        s.serialize_field("width", &self.width())?;
        s.serialize_field("height", &self.height())?;
        s.serialize_field("area", &self.area())?;
        s.serialize_field("center", &self.center())?;
        s.end()
    }
}

/// A typed, localized assertion that a region (and optional text) is PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PIIDetection {
    /// Unique detection identifier
    pub id: Uuid,
    /// Kind of PII detected
    #[serde(rename = "type")]
    pub pii_type: PIIType,
    /// Region of the page this detection covers
    pub bounding_box: BoundingBox,
    /// Confidence score in `[0, 1]`
    pub confidence: f64,
    /// Zero-based page number
    pub page_number: u32,
    /// Text content, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Engine that produced the detection
    pub detection_method: DetectionMethod,
    /// Engine-specific metadata and provenance
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// When the detection was produced
    pub timestamp: DateTime<Utc>,
}

impl PIIDetection {
    /// Create a detection, validating confidence and coordinates.
    pub fn new(
        pii_type: PIIType,
        bounding_box: BoundingBox,
        confidence: f64,
        page_number: u32,
        detection_method: DetectionMethod,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::Internal(format!(
                "confidence must be within [0, 1], got {}",
                confidence
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            pii_type,
            bounding_box,
            confidence,
            page_number,
            text_content: None,
            detection_method,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        })
    }

    /// Attach text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether another detection duplicates this one: same type, same page,
    /// and IoU at or above `iou_threshold`.
    pub fn is_duplicate_of(&self, other: &PIIDetection, iou_threshold: f64) -> bool {
        self.pii_type == other.pii_type
            && self.page_number == other.page_number
            && self.bounding_box.iou(&other.bounding_box) >= iou_threshold
    }

    /// Merge with another detection into a new instance.
    ///
    /// The type comes from the higher-confidence source, the box is the
    /// union, confidence is the max, and provenance is recorded under
    /// `metadata.merged_from`. The method becomes `hybrid` when the sources
    /// disagree.
    pub fn merge_with(&self, other: &PIIDetection) -> PIIDetection {
        let (primary, secondary) = if self.confidence >= other.confidence {
            (self, other)
        } else {
            (other, self)
        };

        let method = if self.detection_method == other.detection_method {
            self.detection_method
        } else {
            DetectionMethod::Hybrid
        };

        let text_content = primary
            .text_content
            .clone()
            .or_else(|| secondary.text_content.clone());

        let mut metadata = primary.metadata.clone();
        metadata.insert(
            "merged_from".to_string(),
            Value::Array(vec![
                Value::String(self.id.to_string()),
                Value::String(other.id.to_string()),
            ]),
        );

        PIIDetection {
            id: Uuid::new_v4(),
            pii_type: primary.pii_type,
            bounding_box: self.bounding_box.union(&other.bounding_box),
            confidence: primary.confidence,
            page_number: primary.page_number,
            text_content,
            detection_method: method,
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Ranking score: confidence plus bonuses for sensitivity,
    /// cross-validation, and hybrid merging.
    pub fn ranking_score(&self) -> f64 {
        let mut score = self.confidence;
        if self.pii_type.is_sensitive() {
            score += 0.1;
        }
        if matches!(self.metadata.get("cross_validated"), Some(Value::Bool(true))) {
            score += 0.05;
        }
        if matches!(self.metadata.get("hybrid_merged"), Some(Value::Bool(true))) {
            score += 0.05;
        }
        score
    }
}

/// Aggregate statistics over a detection collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    /// Total detections
    pub total: usize,
    /// Counts keyed by PII type name
    pub by_type: HashMap<String, usize>,
    /// Counts keyed by page number
    pub by_page: HashMap<u32, usize>,
    /// Counts keyed by detection method
    pub by_method: HashMap<String, usize>,
    /// Minimum confidence, if any detections exist
    pub min_confidence: Option<f64>,
    /// Maximum confidence, if any detections exist
    pub max_confidence: Option<f64>,
    /// Mean confidence, if any detections exist
    pub mean_confidence: Option<f64>,
}

/// Ordered set of detections for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PIIDetectionCollection {
    /// Document the detections belong to, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    /// The detections, in insertion order
    pub detections: Vec<PIIDetection>,
}

impl PIIDetectionCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection bound to a document.
    pub fn for_document(document_id: Uuid) -> Self {
        Self {
            document_id: Some(document_id),
            detections: Vec::new(),
        }
    }

    /// Build from a list of detections.
    pub fn from_detections(detections: Vec<PIIDetection>) -> Self {
        Self {
            document_id: None,
            detections,
        }
    }

    /// Append a detection.
    pub fn add(&mut self, detection: PIIDetection) {
        self.detections.push(detection);
    }

    /// Number of detections.
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detections of one type.
    pub fn filter_by_type(&self, pii_type: PIIType) -> Vec<&PIIDetection> {
        self.detections
            .iter()
            .filter(|d| d.pii_type == pii_type)
            .collect()
    }

    /// Detections on one page.
    pub fn filter_by_page(&self, page_number: u32) -> Vec<&PIIDetection> {
        self.detections
            .iter()
            .filter(|d| d.page_number == page_number)
            .collect()
    }

    /// Detections at or above a confidence floor.
    pub fn with_min_confidence(&self, threshold: f64) -> Vec<&PIIDetection> {
        self.detections
            .iter()
            .filter(|d| d.confidence >= threshold)
            .collect()
    }

    /// Detections of visual types.
    pub fn visual_detections(&self) -> Vec<&PIIDetection> {
        self.detections
            .iter()
            .filter(|d| d.pii_type.is_visual())
            .collect()
    }

    /// Detections of text types.
    pub fn text_detections(&self) -> Vec<&PIIDetection> {
        self.detections
            .iter()
            .filter(|d| d.pii_type.is_text())
            .collect()
    }

    /// Detections of sensitive types.
    pub fn sensitive_detections(&self) -> Vec<&PIIDetection> {
        self.detections
            .iter()
            .filter(|d| d.pii_type.is_sensitive())
            .collect()
    }

    /// Sort by confidence, descending.
    pub fn sort_by_confidence(&mut self) {
        self.detections
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    }

    /// Sort by bounding-box area, descending.
    pub fn sort_by_area(&mut self) {
        self.detections
            .sort_by(|a, b| b.bounding_box.area().cmp(&a.bounding_box.area()));
    }

    /// Merge every duplicate cluster into a single detection.
    ///
    /// Clusters are built transitively: a detection joins a cluster when it
    /// duplicates any member at `iou_threshold`.
    pub fn deduplicate(&mut self, iou_threshold: f64) {
        let mut merged: Vec<PIIDetection> = Vec::with_capacity(self.detections.len());

        for detection in self.detections.drain(..) {
            match merged
                .iter_mut()
                .find(|m| m.is_duplicate_of(&detection, iou_threshold))
            {
                Some(existing) => *existing = existing.merge_with(&detection),
                None => merged.push(detection),
            }
        }

        self.detections = merged;
    }

    /// Compute aggregate statistics.
    pub fn statistics(&self) -> CollectionStatistics {
        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut by_page: HashMap<u32, usize> = HashMap::new();
        let mut by_method: HashMap<String, usize> = HashMap::new();

        for d in &self.detections {
            *by_type.entry(d.pii_type.as_str().to_string()).or_default() += 1;
            *by_page.entry(d.page_number).or_default() += 1;
            *by_method.entry(d.detection_method.to_string()).or_default() += 1;
        }

        let confidences: Vec<f64> = self.detections.iter().map(|d| d.confidence).collect();
        let (min, max, mean) = if confidences.is_empty() {
            (None, None, None)
        } else {
            let min = confidences.iter().copied().fold(f64::INFINITY, f64::min);
            let max = confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
            (Some(min), Some(max), Some(mean))
        };

        CollectionStatistics {
            total: self.detections.len(),
            by_type,
            by_page,
            by_method,
            min_confidence: min,
            max_confidence: max,
            mean_confidence: mean,
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Export as CSV with one row per detection.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "id",
                "type",
                "page",
                "x1",
                "y1",
                "x2",
                "y2",
                "confidence",
                "method",
                "text",
            ])
            .map_err(|e| Error::Internal(format!("csv write failed: {}", e)))?;

        for d in &self.detections {
            writer
                .write_record([
                    d.id.to_string(),
                    d.pii_type.to_string(),
                    d.page_number.to_string(),
                    d.bounding_box.x1.to_string(),
                    d.bounding_box.y1.to_string(),
                    d.bounding_box.x2.to_string(),
                    d.bounding_box.y2.to_string(),
                    format!("{:.4}", d.confidence),
                    d.detection_method.to_string(),
                    d.text_content.clone().unwrap_or_default(),
                ])
                .map_err(|e| Error::Internal(format!("csv write failed: {}", e)))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Internal(format!("csv flush failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| Error::Internal(format!("csv not utf-8: {}", e)))
    }
}
