//! Document analysis: decode PDF and raster inputs into the [`Document`]
//! model with page geometry, optional text, and document-level metadata.

pub(crate) mod pdf;
mod raster;

pub use pdf::extract_pdf_pages;
pub use raster::{extract_raster_page, load_page_raster};

use crate::config::EngineConfig;
use crate::error::{Error, ProcessingStage, Result};
use crate::models::document::{Document, DocumentFormat, PageInfo};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Relative tolerance for treating page sizes as consistent.
const PAGE_SIZE_TOLERANCE: f64 = 0.01;

/// Decodes documents and extracts pages and metadata.
pub struct DocumentAnalyzer {
    config: EngineConfig,
}

/// Pages plus non-fatal decode warnings.
pub struct ExtractedPages {
    pub pages: Vec<PageInfo>,
    pub warnings: Vec<String>,
}

impl DocumentAnalyzer {
    /// Create an analyzer over an engine configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Whether a path has a supported extension.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.config.is_supported_extension(e))
            .unwrap_or(false)
    }

    /// Validate and fully analyze a document.
    pub fn analyze(&self, path: &Path) -> Result<Document> {
        self.validate_input(path)?;

        let format = DocumentFormat::from_path(path);
        let extracted = self.extract_pages_inner(path, format)?;

        if extracted.pages.is_empty() {
            return Err(Error::document_processing(
                ProcessingStage::Analyze,
                path.display().to_string(),
                "no pages could be decoded",
            ));
        }
        for warning in &extracted.warnings {
            warn!("Partial decode of {}: {}", path.display(), warning);
        }

        let mut document = Document::new(path, format, extracted.pages)?;
        document.compute_file_hash()?;
        document.metadata = self.document_metadata(&document, &extracted.warnings)?;

        debug!(
            "Analyzed {} ({} pages, format {})",
            path.display(),
            document.page_count(),
            document.format
        );
        Ok(document)
    }

    /// Extract page data without building a full document.
    pub fn extract_pages(&self, path: &Path) -> Result<Vec<PageInfo>> {
        self.validate_input(path)?;
        let format = DocumentFormat::from_path(path);
        Ok(self.extract_pages_inner(path, format)?.pages)
    }

    /// File-level metadata without page decoding.
    pub fn metadata(&self, path: &Path) -> Result<HashMap<String, Value>> {
        self.validate_input(path)?;

        let meta = std::fs::metadata(path)?;
        let mut map = HashMap::new();
        map.insert("file_size".to_string(), json!(meta.len()));
        map.insert(
            "format".to_string(),
            json!(DocumentFormat::from_path(path).to_string()),
        );
        map.insert(
            "file_name".to_string(),
            json!(path.file_name().and_then(|n| n.to_str()).unwrap_or("")),
        );
        Ok(map)
    }

    /// Reject nonexistent, empty, oversized, or unsupported inputs.
    fn validate_input(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::document_processing(
                ProcessingStage::Analyze,
                path.display().to_string(),
                "file does not exist",
            ));
        }

        let size = std::fs::metadata(path)?.len();
        if size == 0 {
            return Err(Error::document_processing(
                ProcessingStage::Analyze,
                path.display().to_string(),
                "file is empty",
            ));
        }
        if size > self.config.max_file_size {
            return Err(Error::document_processing(
                ProcessingStage::Analyze,
                path.display().to_string(),
                format!(
                    "file size {} exceeds limit {}",
                    size, self.config.max_file_size
                ),
            ));
        }

        if !self.is_supported(path) {
            return Err(Error::document_processing(
                ProcessingStage::Analyze,
                path.display().to_string(),
                "unsupported file extension",
            ));
        }

        Ok(())
    }

    fn extract_pages_inner(&self, path: &Path, format: DocumentFormat) -> Result<ExtractedPages> {
        match format {
            DocumentFormat::Pdf => extract_pdf_pages(path),
            f if f.is_raster() => extract_raster_page(path),
            _ => Err(Error::document_processing(
                ProcessingStage::Analyze,
                path.display().to_string(),
                "unsupported format",
            )),
        }
    }

    /// Document-level metadata: page-size consistency and orientation.
    fn document_metadata(
        &self,
        document: &Document,
        warnings: &[String],
    ) -> Result<HashMap<String, Value>> {
        let mut map = HashMap::new();

        let consistent = page_sizes_consistent(&document.pages);
        map.insert("consistent_page_sizes".to_string(), json!(consistent));
        map.insert(
            "orientation".to_string(),
            json!(orientation_of(&document.pages)),
        );
        map.insert("page_count".to_string(), json!(document.page_count()));
        if !warnings.is_empty() {
            map.insert("decode_warnings".to_string(), json!(warnings));
        }

        Ok(map)
    }
}

/// All page dimensions within 1% of the first page's.
fn page_sizes_consistent(pages: &[PageInfo]) -> bool {
    let Some(first) = pages.first() else {
        return true;
    };
    pages.iter().all(|p| {
        within_tolerance(p.width, first.width) && within_tolerance(p.height, first.height)
    })
}

fn within_tolerance(a: u32, b: u32) -> bool {
    if b == 0 {
        return a == 0;
    }
    ((a as f64 - b as f64).abs() / b as f64) <= PAGE_SIZE_TOLERANCE
}

/// Aggregate orientation over all pages.
fn orientation_of(pages: &[PageInfo]) -> &'static str {
    if pages.is_empty() {
        return "unknown";
    }
    let portrait = pages.iter().filter(|p| p.is_portrait()).count();
    if portrait == pages.len() {
        "portrait"
    } else if portrait == 0 {
        "landscape"
    } else {
        "mixed"
    }
}
