//! Raster image page extraction.

use crate::analyzer::ExtractedPages;
use crate::error::{Error, ProcessingStage, Result};
use crate::models::document::PageInfo;
use image::{DynamicImage, GenericImageView};
use serde_json::json;
use std::path::Path;

/// DPI assumed for raster inputs that declare none.
pub const RASTER_DEFAULT_DPI: u32 = 72;

/// Treat a raster file as a single page.
///
/// RGBA sources are recorded with `has_transparency`; pixel content is left
/// untouched beyond format normalization performed at redaction time.
pub fn extract_raster_page(path: &Path) -> Result<ExtractedPages> {
    let img = load_page_raster(path)?;
    let (width, height) = img.dimensions();

    let has_transparency = img.color().has_alpha();

    let mut page = PageInfo::new(0, width, height, RASTER_DEFAULT_DPI);
    page.metadata
        .insert("has_transparency".to_string(), json!(has_transparency));
    page.metadata
        .insert("color_type".to_string(), json!(format!("{:?}", img.color())));

    Ok(ExtractedPages {
        pages: vec![page],
        warnings: Vec::new(),
    })
}

/// Decode a raster file for pixel-level work (CV, redaction overlays).
pub fn load_page_raster(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| {
        Error::document_processing(
            ProcessingStage::Analyze,
            path.display().to_string(),
            format!("image decode failed: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_rgb_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        RgbImage::from_pixel(320, 200, Rgb([1u8, 2, 3])).save(&path).unwrap();

        let extracted = extract_raster_page(&path).unwrap();
        assert_eq!(extracted.pages.len(), 1);
        let page = &extracted.pages[0];
        assert_eq!((page.width, page.height), (320, 200));
        assert_eq!(page.dpi, RASTER_DEFAULT_DPI);
        assert_eq!(page.metadata["has_transparency"], json!(false));
    }

    #[test]
    fn test_rgba_records_transparency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        RgbaImage::from_pixel(10, 10, Rgba([1u8, 2, 3, 128]))
            .save(&path)
            .unwrap();

        let extracted = extract_raster_page(&path).unwrap();
        assert_eq!(extracted.pages[0].metadata["has_transparency"], json!(true));
    }

    #[test]
    fn test_corrupt_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"\x89PNG but not really").unwrap();
        assert!(extract_raster_page(&path).is_err());
    }
}
