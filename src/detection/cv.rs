//! Computer-vision detector for visual PII.
//!
//! The backend is a deterministic contour heuristic: dark regions are
//! labeled, nearby regions are merged, and each merged region is classified
//! by aspect ratio, ink density, and stripe-transition statistics. It honors
//! the detector contract (types, confidence, coordinate mapping back to the
//! source resolution) without carrying model weights.

use crate::analyzer::load_page_raster;
use crate::detection::{DetectionInput, PIIDetector, PageRaster};
use crate::error::{Error, Result};
use crate::models::document::DocumentFormat;
use crate::models::pii::{BoundingBox, DetectionMethod, PIIDetection, PIIType};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for the CV detector.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CvConfig {
    /// Detect faces
    pub detect_faces: bool,
    /// Detect signatures
    pub detect_signatures: bool,
    /// Detect linear barcodes
    pub detect_barcodes: bool,
    /// Detect QR codes
    pub detect_qr_codes: bool,
    /// Longest side is clamped to this before analysis
    pub resize_max_dimension: u32,
    /// Signature regions below this area (source pixels) are discarded
    pub min_signature_area: u64,
    /// Luminance below this is ink
    pub dark_threshold: u8,
    /// Regions whose expanded boxes are within this gap are merged
    pub merge_gap: u32,
    /// Smallest region bounding-box area considered (analysis pixels)
    pub min_region_area: u64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            detect_faces: true,
            detect_signatures: true,
            detect_barcodes: true,
            detect_qr_codes: true,
            resize_max_dimension: 1024,
            min_signature_area: 1500,
            dark_threshold: 128,
            merge_gap: 10,
            min_region_area: 256,
        }
    }
}

/// CV sub-engine implementing the detector contract.
pub struct CvDetector {
    config: CvConfig,
}

/// Statistics of one candidate region on the analysis-scale mask.
struct RegionStats {
    bbox: (u32, u32, u32, u32),
    density: f64,
    row_transition_rate: f64,
    col_transition_rate: f64,
}

impl CvDetector {
    /// Create a detector with default configuration.
    pub fn new() -> Self {
        Self {
            config: CvConfig::default(),
        }
    }

    /// Create a detector with explicit configuration.
    pub fn with_config(config: CvConfig) -> Self {
        Self { config }
    }

    /// Analyze one rasterized page.
    fn detect_on_raster(&self, raster: &PageRaster) -> Result<Vec<PIIDetection>> {
        let (orig_w, orig_h) = (raster.image.width(), raster.image.height());
        if orig_w == 0 || orig_h == 0 {
            return Ok(Vec::new());
        }

        // Clamp the longest side, preserving aspect; detections are mapped
        // back through the inverse scale.
        let longest = orig_w.max(orig_h);
        let scale = if longest > self.config.resize_max_dimension {
            self.config.resize_max_dimension as f64 / longest as f64
        } else {
            1.0
        };

        let analyzed: DynamicImage = if scale < 1.0 {
            raster.image.resize(
                (orig_w as f64 * scale).round() as u32,
                (orig_h as f64 * scale).round() as u32,
                FilterType::Triangle,
            )
        } else {
            raster.image.clone()
        };

        let mask = ink_mask(&analyzed.to_luma8(), self.config.dark_threshold);
        let regions = propose_regions(&mask, self.config.merge_gap, self.config.min_region_area);

        let mut detections = Vec::new();
        for region in regions {
            let Some((pii_type, confidence)) = self.classify(&region) else {
                continue;
            };

            let (x1, y1, x2, y2) = region.bbox;
            let bbox = BoundingBox::new(
                (x1 as f64 / scale).round() as u32,
                (y1 as f64 / scale).round() as u32,
                ((x2 as f64 / scale).round() as u32).max((x1 as f64 / scale).round() as u32 + 1),
                ((y2 as f64 / scale).round() as u32).max((y1 as f64 / scale).round() as u32 + 1),
            )?;

            if pii_type == PIIType::Signature && bbox.area() < self.config.min_signature_area {
                continue;
            }

            let mut detection = PIIDetection::new(
                pii_type,
                bbox,
                confidence,
                raster.page_number,
                DetectionMethod::Cv,
            )?
            .with_metadata("engine", "cv")
            .with_metadata("model_type", "contour-heuristic");

            if pii_type == PIIType::Barcode {
                let payload = barcode_payload(&mask, region.bbox);
                if !payload.is_empty() {
                    detection = detection
                        .with_text(payload)
                        .with_metadata("extracted_text", true);
                }
            }

            detections.push(detection);
        }

        debug!(
            "CV pass over page {}: {} detections",
            raster.page_number,
            detections.len()
        );
        Ok(detections)
    }

    /// Classify a region, returning the type and confidence.
    fn classify(&self, region: &RegionStats) -> Option<(PIIType, f64)> {
        let (x1, y1, x2, y2) = region.bbox;
        let width = (x2 - x1) as f64;
        let height = (y2 - y1) as f64;
        let aspect = width / height;
        let d = region.density;
        let th = region.row_transition_rate;
        let tv = region.col_transition_rate;

        // Striped codes first: they would otherwise pass the blob tests.
        if self.config.detect_qr_codes
            && (0.75..=1.33).contains(&aspect)
            && th >= 0.10
            && tv >= 0.10
            && (0.25..=0.75).contains(&d)
        {
            let confidence = (0.72 + (th + tv).min(0.6) * 0.35).min(0.98);
            return Some((PIIType::QrCode, confidence));
        }

        if self.config.detect_barcodes
            && aspect >= 1.8
            && th >= 0.10
            && tv <= 0.08
            && (0.25..=0.80).contains(&d)
        {
            let confidence = (0.70 + th.min(0.5) * 0.4).min(0.95);
            return Some((PIIType::Barcode, confidence));
        }

        if self.config.detect_signatures && aspect >= 1.6 && (0.03..=0.35).contains(&d) {
            let confidence = 0.60 + (1.0 - d) * 0.15;
            return Some((PIIType::Signature, confidence));
        }

        if self.config.detect_faces && (0.6..=1.4).contains(&aspect) && d >= 0.30 {
            let confidence = (0.55 + d * 0.3).min(0.92);
            return Some((PIIType::Face, confidence));
        }

        None
    }
}

impl Default for CvDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PIIDetector for CvDetector {
    fn detect_pii(&self, input: &DetectionInput) -> Result<Vec<PIIDetection>> {
        match input {
            DetectionInput::Image(raster) => self.detect_on_raster(raster),
            DetectionInput::Structured {
                image: Some(raster),
                ..
            } => self.detect_on_raster(raster),
            DetectionInput::Path(path) => {
                if DocumentFormat::from_path(path).is_raster() {
                    let raster = PageRaster::new(load_page_raster(path)?);
                    self.detect_on_raster(&raster)
                } else {
                    Ok(Vec::new())
                }
            }
            // Text-only inputs are not this engine's modality.
            _ => Ok(Vec::new()),
        }
    }

    fn supported_types(&self) -> Vec<PIIType> {
        let mut types = Vec::new();
        if self.config.detect_faces {
            types.push(PIIType::Face);
        }
        if self.config.detect_signatures {
            types.push(PIIType::Signature);
        }
        if self.config.detect_barcodes {
            types.push(PIIType::Barcode);
        }
        if self.config.detect_qr_codes {
            types.push(PIIType::QrCode);
        }
        types
    }

    fn configure(&mut self, options: Value) -> Result<()> {
        self.config = serde_json::from_value(options)
            .map_err(|e| Error::Config(format!("invalid CV configuration: {}", e)))?;
        Ok(())
    }

    fn model_info(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("engine".to_string(), json!("cv")),
            ("backend".to_string(), json!("contour-heuristic")),
            (
                "resize_max_dimension".to_string(),
                json!(self.config.resize_max_dimension),
            ),
            (
                "supported_types".to_string(),
                json!(self
                    .supported_types()
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()),
            ),
        ])
    }
}

/// Binary ink mask: true where luminance is below the threshold.
fn ink_mask(luma: &GrayImage, threshold: u8) -> Vec<Vec<bool>> {
    let (w, h) = luma.dimensions();
    let mut mask = vec![vec![false; w as usize]; h as usize];
    for (x, y, pixel) in luma.enumerate_pixels() {
        mask[y as usize][x as usize] = pixel.0[0] < threshold;
    }
    mask
}

/// Label dark components, then merge nearby boxes until stable.
fn propose_regions(mask: &[Vec<bool>], merge_gap: u32, min_area: u64) -> Vec<RegionStats> {
    let mut boxes = component_boxes(mask);

    // Merge boxes whose gap-expanded extents intersect; stripes of a barcode
    // and modules of a QR code coalesce into one region.
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes_near(boxes[i], boxes[j], merge_gap) {
                    let b = boxes.swap_remove(j);
                    boxes[i] = union_box(boxes[i], b);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }

    boxes
        .into_iter()
        .filter(|&(x1, y1, x2, y2)| {
            (x2 - x1) as u64 * (y2 - y1) as u64 >= min_area
        })
        .map(|bbox| region_stats(mask, bbox))
        .collect()
}

/// Bounding boxes of 4-connected dark components.
fn component_boxes(mask: &[Vec<bool>]) -> Vec<(u32, u32, u32, u32)> {
    let h = mask.len();
    let w = if h > 0 { mask[0].len() } else { 0 };
    let mut visited = vec![vec![false; w]; h];
    let mut boxes = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            if !mask[sy][sx] || visited[sy][sx] {
                continue;
            }

            let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);
            let mut stack = vec![(sx, sy)];
            visited[sy][sx] = true;

            while let Some((x, y)) = stack.pop() {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let neighbors = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx < w && ny < h && mask[ny][nx] && !visited[ny][nx] {
                        visited[ny][nx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            boxes.push((min_x as u32, min_y as u32, max_x as u32 + 1, max_y as u32 + 1));
        }
    }

    boxes
}

fn boxes_near(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32), gap: u32) -> bool {
    let ax1 = a.0.saturating_sub(gap);
    let ay1 = a.1.saturating_sub(gap);
    let ax2 = a.2 + gap;
    let ay2 = a.3 + gap;
    ax1 < b.2 && b.0 < ax2 && ay1 < b.3 && b.1 < ay2
}

fn union_box(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> (u32, u32, u32, u32) {
    (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3))
}

/// Compute density and stripe-transition statistics over a box.
fn region_stats(mask: &[Vec<bool>], bbox: (u32, u32, u32, u32)) -> RegionStats {
    let (x1, y1, x2, y2) = bbox;
    let width = (x2 - x1) as usize;
    let height = (y2 - y1) as usize;

    let mut dark = 0u64;
    let mut row_transitions = 0u64;
    for y in y1..y2 {
        let row = &mask[y as usize];
        let mut prev = row[x1 as usize];
        if prev {
            dark += 1;
        }
        for x in (x1 + 1)..x2 {
            let cur = row[x as usize];
            if cur {
                dark += 1;
            }
            if cur != prev {
                row_transitions += 1;
            }
            prev = cur;
        }
    }

    let mut col_transitions = 0u64;
    for x in x1..x2 {
        let mut prev = mask[y1 as usize][x as usize];
        for y in (y1 + 1)..y2 {
            let cur = mask[y as usize][x as usize];
            if cur != prev {
                col_transitions += 1;
            }
            prev = cur;
        }
    }

    let area = (width * height) as f64;
    RegionStats {
        bbox,
        density: dark as f64 / area,
        row_transition_rate: row_transitions as f64 / area,
        col_transition_rate: col_transitions as f64 / area,
    }
}

/// Read the stripe pattern along the middle row of a barcode region.
///
/// Emits a run-length string (bar and gap widths); this is the payload the
/// heuristic backend can honestly extract without a symbology decoder.
fn barcode_payload(mask: &[Vec<bool>], bbox: (u32, u32, u32, u32)) -> String {
    let (x1, y1, x2, y2) = bbox;
    let mid = ((y1 + y2) / 2) as usize;
    if mid >= mask.len() {
        return String::new();
    }

    let row = &mask[mid];
    let mut runs = Vec::new();
    let mut current = row[x1 as usize];
    let mut count = 0u32;
    for x in x1..x2 {
        if row[x as usize] == current {
            count += 1;
        } else {
            runs.push(format!("{}{}", if current { 'b' } else { 'w' }, count));
            current = row[x as usize];
            count = 1;
        }
    }
    runs.push(format!("{}{}", if current { 'b' } else { 'w' }, count));

    if runs.len() < 8 {
        return String::new();
    }
    runs.join("-")
}
