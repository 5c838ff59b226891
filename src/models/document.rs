//! Document and page model.

use crate::crypto;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Png,
    Jpg,
    Jpeg,
    Tiff,
    Bmp,
    Unknown,
}

impl DocumentFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> DocumentFormat {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => Self::Pdf,
            Some("png") => Self::Png,
            Some("jpg") => Self::Jpg,
            Some("jpeg") => Self::Jpeg,
            Some("tif") | Some("tiff") => Self::Tiff,
            Some("bmp") => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// Whether this format is a raster image.
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Png | Self::Jpg | Self::Jpeg | Self::Tiff | Self::Bmp)
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Geometry and text for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Zero-based page number
    pub page_number: u32,
    /// Page width in pixels at the recorded DPI
    pub width: u32,
    /// Page height in pixels at the recorded DPI
    pub height: u32,
    /// Resolution the dimensions were computed at
    pub dpi: u32,
    /// Page rotation in degrees, one of 0/90/180/270
    pub rotation: u16,
    /// Extracted text, when the source carries any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Page-level metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl PageInfo {
    /// Create a page with default rotation and no text.
    pub fn new(page_number: u32, width: u32, height: u32, dpi: u32) -> Self {
        Self {
            page_number,
            width,
            height,
            dpi,
            rotation: 0,
            text_content: None,
            metadata: HashMap::new(),
        }
    }

    /// Whether the page is taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.height >= self.width
    }
}

/// A decoded document: identity, format, pages, and integrity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: Uuid,
    /// Source path
    pub path: PathBuf,
    /// Detected format
    pub format: DocumentFormat,
    /// Pages, numbered `0..n-1`
    pub pages: Vec<PageInfo>,
    /// Document-level metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// SHA-256 of the source bytes, when computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
}

impl Document {
    /// Create a document, validating that page numbers form `0..n-1`.
    pub fn new(path: impl Into<PathBuf>, format: DocumentFormat, pages: Vec<PageInfo>) -> Result<Self> {
        for (i, page) in pages.iter().enumerate() {
            if page.page_number != i as u32 {
                return Err(Error::Internal(format!(
                    "page numbers must be contiguous from 0; found {} at index {}",
                    page.page_number, i
                )));
            }
        }
        Ok(Self {
            id: Uuid::new_v4(),
            path: path.into(),
            format,
            pages,
            metadata: HashMap::new(),
            file_hash: None,
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a page by number.
    pub fn page(&self, page_number: u32) -> Option<&PageInfo> {
        self.pages.get(page_number as usize)
    }

    /// Recompute the SHA-256 hash of the source file and record it.
    pub fn compute_file_hash(&mut self) -> Result<&str> {
        let hash = crypto::sha256_file(&self.path)?;
        self.file_hash = Some(hash);
        Ok(self.file_hash.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.PDF")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(Path::new("a.jpeg")), DocumentFormat::Jpeg);
        assert_eq!(DocumentFormat::from_path(Path::new("scan.tif")), DocumentFormat::Tiff);
        assert_eq!(DocumentFormat::from_path(Path::new("no_ext")), DocumentFormat::Unknown);
        assert!(DocumentFormat::Png.is_raster());
        assert!(!DocumentFormat::Pdf.is_raster());
    }

    #[test]
    fn test_contiguous_page_numbers_required() {
        let pages = vec![PageInfo::new(0, 100, 200, 72), PageInfo::new(2, 100, 200, 72)];
        assert!(Document::new("doc.pdf", DocumentFormat::Pdf, pages).is_err());

        let pages = vec![PageInfo::new(0, 100, 200, 72), PageInfo::new(1, 100, 200, 72)];
        let doc = Document::new("doc.pdf", DocumentFormat::Pdf, pages).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert!(doc.page(1).is_some());
        assert!(doc.page(2).is_none());
    }

    #[test]
    fn test_compute_file_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.png");
        std::fs::write(&path, b"pixels").unwrap();

        let mut doc =
            Document::new(&path, DocumentFormat::Png, vec![PageInfo::new(0, 1, 1, 72)]).unwrap();
        let hash = doc.compute_file_hash().unwrap().to_string();
        assert_eq!(hash, crypto::sha256_bytes(b"pixels"));
        assert_eq!(doc.file_hash.as_deref(), Some(hash.as_str()));
    }

    #[test]
    fn test_portrait_orientation() {
        assert!(PageInfo::new(0, 100, 200, 72).is_portrait());
        assert!(!PageInfo::new(0, 200, 100, 72).is_portrait());
    }
}
