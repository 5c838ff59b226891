//! NLP detector: regex pattern families plus lexicon-based NER.
//!
//! Text-only input gets synthesized coordinates (column- and line-
//! proportional) so downstream redaction always has positional anchors; real
//! coordinates supplied by the caller override the synthesized ones.

use crate::detection::{DetectionInput, PIIDetector};
use crate::error::{Error, Result};
use crate::models::pii::{BoundingBox, DetectionMethod, PIIDetection, PIIType};
use chrono::{Datelike, Utc};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// TLDs that raise e-mail confidence.
const KNOWN_TLDS: &[&str] = &["com", "org", "net", "edu", "gov", "io"];

/// Given names used by the lexicon NER to confirm capitalized name pairs.
const GIVEN_NAMES: &[&str] = &[
    "john", "jane", "james", "mary", "robert", "patricia", "michael", "linda", "david", "sarah",
    "william", "elizabeth", "richard", "susan", "thomas", "jessica", "daniel", "karen", "maria",
    "alice", "peter", "emma", "priya", "raj", "amit", "sunita", "wei", "ahmed", "fatima", "carlos",
    "ana", "ivan", "olga",
];

/// A real coordinate anchor for a byte span of the input text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanCoordinate {
    /// Byte offset where the span starts
    pub start: usize,
    /// Byte offset one past the span end
    pub end: usize,
    /// Page region the span occupies
    pub bbox: BoundingBox,
}

/// Text buffer handed to the NLP engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TextInput {
    /// The text to scan
    pub text: String,
    /// Zero-based page the text belongs to
    pub page_number: u32,
    /// Real coordinate anchors; synthesized ones are used where absent
    pub coordinates: Option<Vec<SpanCoordinate>>,
}

impl TextInput {
    /// Plain text on page 0.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_number: 0,
            coordinates: None,
        }
    }

    /// Join a list of lines with newlines.
    pub fn from_lines(lines: &[&str]) -> Self {
        Self::plain(lines.join("\n"))
    }

    /// Bind the text to a page.
    pub fn on_page(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }

    /// Attach real coordinate anchors.
    pub fn with_coordinates(mut self, coordinates: Vec<SpanCoordinate>) -> Self {
        self.coordinates = Some(coordinates);
        self
    }
}

/// Configuration for the NLP detector.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NlpConfig {
    /// Minimum confidence for NER entities to be accepted
    pub name_confidence_threshold: f64,
    /// Same-type detections within this pixel gap are merged
    pub proximity_threshold: u32,
    /// Enable lexicon-based NER on top of the regex families
    pub enable_ner: bool,
    /// Pixel width of one character in synthesized coordinates
    pub char_width: u32,
    /// Pixel height of one line in synthesized coordinates
    pub line_height: u32,
    /// Page margin for synthesized coordinates
    pub margin: u32,
}

impl Default for NlpConfig {
    fn default() -> Self {
        Self {
            name_confidence_threshold: 0.7,
            proximity_threshold: 40,
            enable_ner: true,
            char_width: 8,
            line_height: 20,
            margin: 10,
        }
    }
}

/// One raw pattern match prior to coordinate assignment.
struct RawMatch {
    start: usize,
    end: usize,
    pii_type: PIIType,
    confidence: f64,
    text: String,
    metadata: HashMap<String, Value>,
}

/// Compiled pattern families.
struct Patterns {
    email: Regex,
    phone_us: Regex,
    phone_intl: Regex,
    phone_indic: Regex,
    ssn_formatted: Regex,
    ssn_bare: Regex,
    credit_card: Regex,
    dob_slash: Regex,
    dob_iso: Regex,
    dob_month_name: Regex,
    ip: Regex,
    devanagari: Regex,
    bengali: Regex,
    tamil: Regex,
    honorific_name: Regex,
    cap_pair: Regex,
    street_address: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            // Dot-atom local part: no leading or trailing dot can match.
            email: Regex::new(
                r"[A-Za-z0-9](?:[A-Za-z0-9._%+-]*[A-Za-z0-9])?@[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?\.[A-Za-z]{2,}",
            )
            .unwrap(),
            phone_us: Regex::new(r"(?:\+1[\s.-]?)?(?:\(\d{3}\)\s?|\d{3}[\s.-])\d{3}[\s.-]\d{4}")
                .unwrap(),
            phone_intl: Regex::new(r"\+\d{1,3}(?:[\s.-]?\d{2,4}){2,4}").unwrap(),
            phone_indic: Regex::new(r"(?:\+91[\s.-]?)?[6-9]\d{4}[\s.-]?\d{5}").unwrap(),
            ssn_formatted: Regex::new(r"\d{3}-\d{2}-\d{4}|\d{3} \d{2} \d{4}").unwrap(),
            ssn_bare: Regex::new(r"\d{9}").unwrap(),
            credit_card: Regex::new(r"(?:\d[ -]?){12,18}\d").unwrap(),
            dob_slash: Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{4}\b").unwrap(),
            dob_iso: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap(),
            dob_month_name: Regex::new(
                r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b",
            )
            .unwrap(),
            ip: Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap(),
            devanagari: Regex::new(r"\p{Devanagari}{2,}(?:\s\p{Devanagari}{2,})*").unwrap(),
            bengali: Regex::new(r"\p{Bengali}{2,}(?:\s\p{Bengali}{2,})*").unwrap(),
            tamil: Regex::new(r"\p{Tamil}{2,}(?:\s\p{Tamil}{2,})*").unwrap(),
            honorific_name: Regex::new(
                r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?",
            )
            .unwrap(),
            cap_pair: Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap(),
            street_address: Regex::new(
                r"\b\d{1,5}\s+[A-Z][a-z]+\s+(?:Street|St|Avenue|Ave|Road|Rd|Lane|Ln|Boulevard|Blvd|Drive|Dr)\b\.?",
            )
            .unwrap(),
        }
    }
}

/// NLP sub-engine implementing the detector contract.
pub struct NlpDetector {
    config: NlpConfig,
    patterns: Patterns,
}

impl NlpDetector {
    /// Create a detector with default configuration.
    pub fn new() -> Self {
        Self {
            config: NlpConfig::default(),
            patterns: Patterns::compile(),
        }
    }

    /// Create a detector with explicit configuration.
    pub fn with_config(config: NlpConfig) -> Self {
        Self {
            config,
            patterns: Patterns::compile(),
        }
    }

    /// Scan a text input.
    fn detect_on_text(&self, input: &TextInput) -> Result<Vec<PIIDetection>> {
        let text = &input.text;
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut raw: Vec<RawMatch> = Vec::new();

        // Family order resolves digit-range contention: earlier families
        // claim their spans; later families skip overlapping matches.
        self.collect_emails(text, &mut raw, &mut claimed);
        self.collect_credit_cards(text, &mut raw, &mut claimed);
        self.collect_phones(text, &mut raw, &mut claimed);
        self.collect_ssns(text, &mut raw, &mut claimed);
        self.collect_dobs(text, &mut raw, &mut claimed);
        self.collect_ips(text, &mut raw, &mut claimed);
        self.collect_indic_names(text, &mut raw, &mut claimed);
        if self.config.enable_ner {
            self.collect_ner(text, &mut raw, &mut claimed);
        }

        let line_index = LineIndex::new(text);
        let mut detections = Vec::with_capacity(raw.len());
        for m in raw {
            let bbox = self.anchor_for(input, &line_index, m.start, m.end)?;
            let mut detection = PIIDetection::new(
                m.pii_type,
                bbox,
                m.confidence.clamp(0.0, 1.0),
                input.page_number,
                DetectionMethod::Nlp,
            )?
            .with_text(m.text);
            detection.metadata = m.metadata;
            detection
                .metadata
                .insert("engine".to_string(), json!("nlp"));
            detections.push(detection);
        }

        let detections = self.proximity_merge(detections);
        let detections = remove_duplicates(detections);

        debug!(
            "NLP pass over page {}: {} detections",
            input.page_number,
            detections.len()
        );
        Ok(detections)
    }

    // ==================== Pattern families ====================

    fn collect_emails(&self, text: &str, out: &mut Vec<RawMatch>, claimed: &mut Vec<(usize, usize)>) {
        for m in self.patterns.email.find_iter(text) {
            if overlaps_any(claimed, m.start(), m.end()) {
                continue;
            }
            let matched = m.as_str();
            let mut confidence = 0.9;
            let mut metadata = HashMap::new();

            if let Some(tld) = matched.rsplit('.').next() {
                if KNOWN_TLDS.contains(&tld.to_ascii_lowercase().as_str()) {
                    confidence += 0.05;
                    metadata.insert("known_tld".to_string(), json!(true));
                }
            }
            if matched.contains("..") {
                confidence -= 0.15;
                metadata.insert("suspicious_adjacency".to_string(), json!(true));
            }

            claimed.push((m.start(), m.end()));
            out.push(RawMatch {
                start: m.start(),
                end: m.end(),
                pii_type: PIIType::Email,
                confidence,
                text: matched.to_string(),
                metadata,
            });
        }
    }

    fn collect_credit_cards(
        &self,
        text: &str,
        out: &mut Vec<RawMatch>,
        claimed: &mut Vec<(usize, usize)>,
    ) {
        for m in self.patterns.credit_card.find_iter(text) {
            if overlaps_any(claimed, m.start(), m.end()) || !digit_bounded(text, m.start(), m.end()) {
                continue;
            }
            let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
            if !(13..=19).contains(&digits.len()) {
                continue;
            }
            // Non-Luhn digit runs are not card numbers.
            if !luhn_valid(&digits) {
                continue;
            }

            claimed.push((m.start(), m.end()));
            out.push(RawMatch {
                start: m.start(),
                end: m.end(),
                pii_type: PIIType::CreditCard,
                confidence: 0.85,
                text: m.as_str().to_string(),
                metadata: HashMap::from([("luhn_valid".to_string(), json!(true))]),
            });
        }
    }

    fn collect_phones(&self, text: &str, out: &mut Vec<RawMatch>, claimed: &mut Vec<(usize, usize)>) {
        let families: [(&Regex, &str); 3] = [
            (&self.patterns.phone_us, "us"),
            (&self.patterns.phone_indic, "indic"),
            (&self.patterns.phone_intl, "international"),
        ];

        for (re, family) in families {
            for m in re.find_iter(text) {
                if overlaps_any(claimed, m.start(), m.end())
                    || !digit_bounded(text, m.start(), m.end())
                {
                    continue;
                }
                let original = m.as_str().to_string();
                let normalized = normalize_phone(&original);

                claimed.push((m.start(), m.end()));
                out.push(RawMatch {
                    start: m.start(),
                    end: m.end(),
                    pii_type: PIIType::Phone,
                    confidence: 0.8,
                    text: normalized,
                    metadata: HashMap::from([
                        ("original_format".to_string(), json!(original)),
                        ("phone_format".to_string(), json!(family)),
                    ]),
                });
            }
        }
    }

    fn collect_ssns(&self, text: &str, out: &mut Vec<RawMatch>, claimed: &mut Vec<(usize, usize)>) {
        for (re, confidence) in [(&self.patterns.ssn_formatted, 0.85), (&self.patterns.ssn_bare, 0.65)]
        {
            for m in re.find_iter(text) {
                if overlaps_any(claimed, m.start(), m.end())
                    || !digit_bounded(text, m.start(), m.end())
                {
                    continue;
                }
                claimed.push((m.start(), m.end()));
                out.push(RawMatch {
                    start: m.start(),
                    end: m.end(),
                    pii_type: PIIType::Ssn,
                    confidence,
                    text: m.as_str().to_string(),
                    metadata: HashMap::new(),
                });
            }
        }
    }

    fn collect_dobs(&self, text: &str, out: &mut Vec<RawMatch>, claimed: &mut Vec<(usize, usize)>) {
        let current_year = Utc::now().year();
        let families = [
            (&self.patterns.dob_slash, "numeric"),
            (&self.patterns.dob_iso, "iso"),
            (&self.patterns.dob_month_name, "month_name"),
        ];

        for (re, format) in families {
            for m in re.find_iter(text) {
                if overlaps_any(claimed, m.start(), m.end()) {
                    continue;
                }
                // A date is a birth date only when its year is plausible for
                // a living person older than five years.
                let Some(year) = extract_year(m.as_str()) else {
                    continue;
                };
                if year < 1900 || year > current_year - 5 {
                    continue;
                }

                claimed.push((m.start(), m.end()));
                out.push(RawMatch {
                    start: m.start(),
                    end: m.end(),
                    pii_type: PIIType::DateOfBirth,
                    confidence: 0.75,
                    text: m.as_str().to_string(),
                    metadata: HashMap::from([
                        ("date_format".to_string(), json!(format)),
                        ("year".to_string(), json!(year)),
                    ]),
                });
            }
        }
    }

    fn collect_ips(&self, text: &str, out: &mut Vec<RawMatch>, claimed: &mut Vec<(usize, usize)>) {
        for m in self.patterns.ip.find_iter(text) {
            if overlaps_any(claimed, m.start(), m.end()) {
                continue;
            }
            let octets_valid = m
                .as_str()
                .split('.')
                .all(|o| o.parse::<u32>().map(|v| v <= 255).unwrap_or(false));
            if !octets_valid {
                continue;
            }

            claimed.push((m.start(), m.end()));
            out.push(RawMatch {
                start: m.start(),
                end: m.end(),
                pii_type: PIIType::IpAddress,
                confidence: 0.85,
                text: m.as_str().to_string(),
                metadata: HashMap::new(),
            });
        }
    }

    fn collect_indic_names(
        &self,
        text: &str,
        out: &mut Vec<RawMatch>,
        claimed: &mut Vec<(usize, usize)>,
    ) {
        let scripts: [(&Regex, &str); 3] = [
            (&self.patterns.devanagari, "devanagari"),
            (&self.patterns.bengali, "bengali"),
            (&self.patterns.tamil, "tamil"),
        ];

        for (re, script) in scripts {
            for m in re.find_iter(text) {
                if overlaps_any(claimed, m.start(), m.end()) {
                    continue;
                }
                claimed.push((m.start(), m.end()));
                out.push(RawMatch {
                    start: m.start(),
                    end: m.end(),
                    pii_type: PIIType::Name,
                    confidence: 0.75,
                    text: m.as_str().to_string(),
                    metadata: HashMap::from([("script".to_string(), json!(script))]),
                });
            }
        }
    }

    fn collect_ner(&self, text: &str, out: &mut Vec<RawMatch>, claimed: &mut Vec<(usize, usize)>) {
        let threshold = self.config.name_confidence_threshold;

        for m in self.patterns.honorific_name.find_iter(text) {
            if overlaps_any(claimed, m.start(), m.end()) {
                continue;
            }
            let confidence = 0.85;
            if confidence < threshold {
                continue;
            }
            claimed.push((m.start(), m.end()));
            out.push(RawMatch {
                start: m.start(),
                end: m.end(),
                pii_type: PIIType::Name,
                confidence,
                text: m.as_str().to_string(),
                metadata: HashMap::from([("entity".to_string(), json!("person"))]),
            });
        }

        for m in self.patterns.cap_pair.find_iter(text) {
            if overlaps_any(claimed, m.start(), m.end()) {
                continue;
            }
            let first_word = m
                .as_str()
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            // A known given name confirms the pair; unknown pairs stay below
            // the acceptance threshold.
            let confidence = if GIVEN_NAMES.contains(&first_word.as_str()) {
                0.85
            } else {
                0.55
            };
            if confidence < threshold {
                continue;
            }

            claimed.push((m.start(), m.end()));
            out.push(RawMatch {
                start: m.start(),
                end: m.end(),
                pii_type: PIIType::Name,
                confidence,
                text: m.as_str().to_string(),
                metadata: HashMap::from([("entity".to_string(), json!("person"))]),
            });
        }

        for m in self.patterns.street_address.find_iter(text) {
            if overlaps_any(claimed, m.start(), m.end()) {
                continue;
            }
            let confidence = 0.8;
            if confidence < threshold {
                continue;
            }
            claimed.push((m.start(), m.end()));
            out.push(RawMatch {
                start: m.start(),
                end: m.end(),
                pii_type: PIIType::Address,
                confidence,
                text: m.as_str().to_string(),
                metadata: HashMap::from([("entity".to_string(), json!("location"))]),
            });
        }
    }

    // ==================== Coordinates ====================

    /// Resolve a bounding box for a byte span: a real anchor when one covers
    /// the span, synthesized line/column geometry otherwise.
    fn anchor_for(
        &self,
        input: &TextInput,
        lines: &LineIndex,
        start: usize,
        end: usize,
    ) -> Result<BoundingBox> {
        if let Some(anchors) = &input.coordinates {
            if let Some(anchor) = anchors.iter().find(|a| a.start <= start && end <= a.end) {
                return Ok(anchor.bbox);
            }
        }

        let (line, col_start) = lines.position(start);
        let (end_line, col_end) = lines.position(end);
        // Multi-line matches are anchored to their first line.
        let col_end = if end_line != line { col_start + (end - start) } else { col_end };

        let x1 = self.config.margin + col_start as u32 * self.config.char_width;
        let x2 = self.config.margin + (col_end.max(col_start + 1)) as u32 * self.config.char_width;
        let y1 = self.config.margin + line as u32 * self.config.line_height;
        let y2 = y1 + self.config.line_height - 4;
        BoundingBox::new(x1, y1, x2, y2)
    }

    /// Merge same-type detections on the same page that sit within the
    /// proximity threshold, concatenating their text in reading order.
    fn proximity_merge(&self, detections: Vec<PIIDetection>) -> Vec<PIIDetection> {
        let threshold = self.config.proximity_threshold;
        let mut merged: Vec<PIIDetection> = Vec::with_capacity(detections.len());

        for detection in detections {
            let near = merged.iter_mut().find(|m| {
                m.pii_type == detection.pii_type
                    && m.page_number == detection.page_number
                    && box_gap(&m.bounding_box, &detection.bounding_box) <= threshold as u64
            });
            match near {
                Some(existing) => {
                    let (left, right) =
                        if existing.bounding_box.x1 <= detection.bounding_box.x1 {
                            (existing.text_content.clone(), detection.text_content.clone())
                        } else {
                            (detection.text_content.clone(), existing.text_content.clone())
                        };
                    let text = [left, right]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ");

                    existing.bounding_box = existing.bounding_box.union(&detection.bounding_box);
                    existing.confidence = existing.confidence.max(detection.confidence);
                    if !text.is_empty() {
                        existing.text_content = Some(text);
                    }
                    existing
                        .metadata
                        .insert("proximity_merged".to_string(), json!(true));
                }
                None => merged.push(detection),
            }
        }

        merged
    }
}

impl Default for NlpDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PIIDetector for NlpDetector {
    fn detect_pii(&self, input: &DetectionInput) -> Result<Vec<PIIDetection>> {
        match input {
            DetectionInput::Text(text) => self.detect_on_text(text),
            DetectionInput::Structured { text: Some(text), .. } => self.detect_on_text(text),
            DetectionInput::Path(path) => match std::fs::read_to_string(path) {
                Ok(content) => self.detect_on_text(&TextInput::plain(content)),
                // Binary files are not this engine's modality.
                Err(_) => Ok(Vec::new()),
            },
            _ => Ok(Vec::new()),
        }
    }

    fn supported_types(&self) -> Vec<PIIType> {
        vec![
            PIIType::Name,
            PIIType::Email,
            PIIType::Phone,
            PIIType::Address,
            PIIType::Ssn,
            PIIType::CreditCard,
            PIIType::DateOfBirth,
            PIIType::IpAddress,
        ]
    }

    fn configure(&mut self, options: Value) -> Result<()> {
        self.config = serde_json::from_value(options)
            .map_err(|e| Error::Config(format!("invalid NLP configuration: {}", e)))?;
        Ok(())
    }

    fn model_info(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("engine".to_string(), json!("nlp")),
            ("backend".to_string(), json!("regex+lexicon")),
            ("ner_enabled".to_string(), json!(self.config.enable_ner)),
            (
                "name_confidence_threshold".to_string(),
                json!(self.config.name_confidence_threshold),
            ),
        ])
    }
}

// ==================== Helpers ====================

/// Byte offsets of line starts, for offset-to-(line, column) mapping.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// Line index and column for a byte offset.
    fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line, offset - self.starts[line])
    }
}

fn overlaps_any(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|&(s, e)| start < e && s < end)
}

/// The characters around a numeric match must not be digits.
fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

/// Luhn checksum over a digit string.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// Normalize a phone number into `(NNN) NNN-NNNN` or `+CC ...` form.
fn normalize_phone(original: &str) -> String {
    let has_plus = original.trim_start().starts_with('+');
    let digits: String = original.chars().filter(|c| c.is_ascii_digit()).collect();

    if !has_plus && digits.len() == 10 {
        return format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10]);
    }
    if !has_plus && digits.len() == 11 && digits.starts_with('1') {
        return format!("({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..11]);
    }
    if has_plus {
        return format!("+{}", digits);
    }
    digits
}

/// Pull a plausible year out of a date string.
fn extract_year(date: &str) -> Option<i32> {
    let digit_groups: Vec<&str> = date
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .collect();
    digit_groups
        .iter()
        .find(|g| g.len() == 4)
        .and_then(|g| g.parse().ok())
}

/// Smallest axis-aligned pixel gap between two boxes (0 when they touch).
fn box_gap(a: &BoundingBox, b: &BoundingBox) -> u64 {
    let dx = if a.x2 < b.x1 {
        (b.x1 - a.x2) as u64
    } else if b.x2 < a.x1 {
        (a.x1 - b.x2) as u64
    } else {
        0
    };
    let dy = if a.y2 < b.y1 {
        (b.y1 - a.y2) as u64
    } else if b.y2 < a.y1 {
        (a.y1 - b.y2) as u64
    } else {
        0
    };
    dx.max(dy)
}

/// Among same-type overlapping detections, keep the highest confidence.
fn remove_duplicates(mut detections: Vec<PIIDetection>) -> Vec<PIIDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<PIIDetection> = Vec::with_capacity(detections.len());
    for detection in detections {
        let duplicate = kept.iter().any(|k| {
            k.pii_type == detection.pii_type
                && k.page_number == detection.page_number
                && k.bounding_box.iou(&detection.bounding_box) >= 0.5
        });
        if !duplicate {
            kept.push(detection);
        }
    }
    kept
}
