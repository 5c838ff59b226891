//! PII detection engines.
//!
//! Sub-engines implement the [`PIIDetector`] capability: CV for visual types
//! (faces, signatures, barcodes, QR codes), NLP for text types, and the
//! hybrid engine composing both with cross-validation, merging, filtering,
//! and ranking.

pub mod cv;
pub mod hybrid;
pub mod nlp;

pub use cv::{CvConfig, CvDetector};
pub use hybrid::{HybridConfig, HybridDetectionEngine};
pub use nlp::{NlpConfig, NlpDetector, SpanCoordinate, TextInput};

use crate::error::Result;
use crate::models::pii::{PIIDetection, PIIType};
use image::DynamicImage;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// A rasterized page handed to the CV engine.
#[derive(Debug, Clone)]
pub struct PageRaster {
    /// Decoded page pixels
    pub image: DynamicImage,
    /// Zero-based page number the raster belongs to
    pub page_number: u32,
}

impl PageRaster {
    /// Wrap an image as page 0.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            page_number: 0,
        }
    }

    /// Wrap an image for a specific page.
    pub fn for_page(image: DynamicImage, page_number: u32) -> Self {
        Self { image, page_number }
    }
}

/// Input routed to the detection engines.
///
/// Image inputs go to CV only, text inputs to NLP only; structured inputs
/// fan out to both when both sub-engines are enabled.
#[derive(Debug, Clone)]
pub enum DetectionInput {
    /// A file on disk; routing depends on its format
    Path(PathBuf),
    /// A rasterized page
    Image(PageRaster),
    /// A text buffer with optional positional anchors
    Text(TextInput),
    /// Paired image and text data for one page
    Structured {
        image: Option<PageRaster>,
        text: Option<TextInput>,
    },
}

/// Capability contract shared by CV, NLP, and hybrid engines.
///
/// Implementations are expected to fail soft inside composite engines: an
/// error from one sub-engine must never abort another.
pub trait PIIDetector: Send + Sync {
    /// Run detection over an input.
    fn detect_pii(&self, input: &DetectionInput) -> Result<Vec<PIIDetection>>;

    /// PII types this engine can produce.
    fn supported_types(&self) -> Vec<PIIType>;

    /// Apply configuration options.
    fn configure(&mut self, options: Value) -> Result<()>;

    /// Describe the backing model or heuristic.
    fn model_info(&self) -> HashMap<String, Value>;
}
