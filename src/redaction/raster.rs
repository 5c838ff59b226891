//! Style-specific redaction overlays for raster documents.

use crate::error::{Error, ProcessingStage, Result};
use crate::models::pii::{BoundingBox, PIIDetection};
use crate::models::profile::{RedactionProfile, RedactionStyle};
use image::imageops::FilterType;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;

/// Redact a single-page raster document.
///
/// Detections on pages other than 0 are skipped with a warning. The output
/// preserves the original format (driven by the output extension).
pub fn redact_raster(
    input: &Path,
    output: &Path,
    by_page: &BTreeMap<u32, Vec<&PIIDetection>>,
    profile: &RedactionProfile,
    warnings: &mut Vec<String>,
) -> Result<Vec<PIIDetection>> {
    let img = image::open(input).map_err(|e| {
        Error::document_processing(
            ProcessingStage::Redact,
            input.display().to_string(),
            format!("image decode failed: {}", e),
        )
    })?;

    let has_alpha = img.color().has_alpha();
    let mut canvas = img.to_rgba8();
    let mut redacted = Vec::new();

    for (&page, detections) in by_page {
        if page != 0 {
            warnings.push(format!(
                "page {} out of range for single-page image; skipped {} detections",
                page,
                detections.len()
            ));
            continue;
        }
        for detection in detections {
            match apply_style(&mut canvas, &detection.bounding_box, profile.redaction_style) {
                Ok(()) => redacted.push((*detection).clone()),
                Err(e) => warnings.push(format!(
                    "failed to redact region on page {}: {}",
                    page, e
                )),
            }
        }
    }

    // RGBA sources keep their alpha; everything else is normalized to RGB.
    let result = if has_alpha {
        DynamicImage::ImageRgba8(canvas)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    };
    result.save(output).map_err(|e| {
        Error::document_processing(
            ProcessingStage::Redact,
            output.display().to_string(),
            format!("image encode failed: {}", e),
        )
    })?;

    Ok(redacted)
}

/// Paint one region according to the redaction style.
fn apply_style(canvas: &mut RgbaImage, bbox: &BoundingBox, style: RedactionStyle) -> Result<()> {
    let (width, height) = canvas.dimensions();
    let x1 = bbox.x1.min(width);
    let y1 = bbox.y1.min(height);
    let x2 = bbox.x2.min(width);
    let y2 = bbox.y2.min(height);
    if x1 >= x2 || y1 >= y2 {
        return Err(Error::Internal(format!(
            "region ({}, {}, {}, {}) lies outside the {}x{} page",
            bbox.x1, bbox.y1, bbox.x2, bbox.y2, width, height
        )));
    }

    match style {
        RedactionStyle::SolidBlack => fill(canvas, x1, y1, x2, y2, Rgba([0, 0, 0, 255])),
        RedactionStyle::SolidWhite => fill(canvas, x1, y1, x2, y2, Rgba([255, 255, 255, 255])),
        RedactionStyle::Pixelated => pixelate(canvas, x1, y1, x2, y2),
        RedactionStyle::Blurred => blur(canvas, x1, y1, x2, y2),
        RedactionStyle::Pattern => cross_hatch(canvas, x1, y1, x2, y2),
    }
    Ok(())
}

fn fill(canvas: &mut RgbaImage, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgba<u8>) {
    for y in y1..y2 {
        for x in x1..x2 {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// Downsample the region to a coarse grid, then upsample with nearest
/// neighbor. The grid is proportional to the region area so larger regions
/// keep larger blocks.
fn pixelate(canvas: &mut RgbaImage, x1: u32, y1: u32, x2: u32, y2: u32) {
    let w = x2 - x1;
    let h = y2 - y1;

    let block = ((w as f64 * h as f64).sqrt() / 8.0).clamp(4.0, 32.0) as u32;
    let grid_w = (w / block).max(1);
    let grid_h = (h / block).max(1);

    let region = imageops::crop(canvas, x1, y1, w, h).to_image();
    let coarse = imageops::resize(&region, grid_w, grid_h, FilterType::Triangle);
    let blocky = imageops::resize(&coarse, w, h, FilterType::Nearest);
    imageops::replace(canvas, &blocky, x1 as i64, y1 as i64);
}

/// Gaussian blur with radius proportional to the region size.
fn blur(canvas: &mut RgbaImage, x1: u32, y1: u32, x2: u32, y2: u32) {
    let w = x2 - x1;
    let h = y2 - y1;

    let sigma = (w.min(h) as f32 / 10.0).max(3.0);
    let region = imageops::crop(canvas, x1, y1, w, h).to_image();
    let blurred = imageops::blur(&region, sigma);
    imageops::replace(canvas, &blurred, x1 as i64, y1 as i64);
}

/// Diagonal cross-hatch over a white base.
fn cross_hatch(canvas: &mut RgbaImage, x1: u32, y1: u32, x2: u32, y2: u32) {
    const SPACING: u32 = 6;
    fill(canvas, x1, y1, x2, y2, Rgba([255, 255, 255, 255]));

    let ink = Rgba([0, 0, 0, 255]);
    for y in y1..y2 {
        for x in x1..x2 {
            let dx = x - x1;
            let dy = y - y1;
            if (dx + dy) % SPACING == 0 || (dx + (y2 - 1 - y)) % SPACING == 0 {
                canvas.put_pixel(x, y, ink);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pii::{DetectionMethod, PIIType};
    use image::{Rgb, RgbImage};

    fn gradient_image(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.put_pixel(x, y, Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 128]));
            }
        }
        DynamicImage::ImageRgb8(img).to_rgba8()
    }

    fn bbox(x1: u32, y1: u32, x2: u32, y2: u32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_solid_black_fill() {
        let mut canvas = gradient_image(100, 100);
        apply_style(&mut canvas, &bbox(10, 10, 50, 40), RedactionStyle::SolidBlack).unwrap();

        assert_eq!(*canvas.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(49, 39), Rgba([0, 0, 0, 255]));
        // Outside the region is untouched
        assert_ne!(*canvas.get_pixel(60, 60), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_solid_white_fill() {
        let mut canvas = gradient_image(100, 100);
        apply_style(&mut canvas, &bbox(0, 0, 20, 20), RedactionStyle::SolidWhite).unwrap();
        assert_eq!(*canvas.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_pixelate_obscures_detail() {
        let mut canvas = gradient_image(200, 200);
        let original = canvas.clone();
        apply_style(&mut canvas, &bbox(20, 20, 180, 180), RedactionStyle::Pixelated).unwrap();

        // The region changed and neighboring pixels collapsed into blocks
        assert_ne!(canvas, original);
        let a = canvas.get_pixel(60, 60);
        let b = canvas.get_pixel(61, 60);
        assert_eq!(a, b);
    }

    #[test]
    fn test_blur_changes_region_only() {
        let mut canvas = gradient_image(120, 120);
        let original = canvas.clone();
        apply_style(&mut canvas, &bbox(30, 30, 90, 90), RedactionStyle::Blurred).unwrap();

        assert_ne!(canvas, original);
        // Pixels outside the region are untouched
        assert_eq!(canvas.get_pixel(5, 5), original.get_pixel(5, 5));
        assert_eq!(canvas.get_pixel(100, 100), original.get_pixel(100, 100));
    }

    #[test]
    fn test_pattern_has_both_colors() {
        let mut canvas = gradient_image(80, 80);
        apply_style(&mut canvas, &bbox(10, 10, 70, 70), RedactionStyle::Pattern).unwrap();

        let mut saw_ink = false;
        let mut saw_base = false;
        for y in 10..70 {
            for x in 10..70 {
                match *canvas.get_pixel(x, y) {
                    Rgba([0, 0, 0, 255]) => saw_ink = true,
                    Rgba([255, 255, 255, 255]) => saw_base = true,
                    _ => panic!("unexpected pattern pixel"),
                }
            }
        }
        assert!(saw_ink && saw_base);
    }

    #[test]
    fn test_region_fully_outside_errors() {
        let mut canvas = gradient_image(50, 50);
        let result = apply_style(&mut canvas, &bbox(60, 60, 90, 90), RedactionStyle::SolidBlack);
        assert!(result.is_err());
    }

    #[test]
    fn test_redact_raster_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        DynamicImage::ImageRgba8(gradient_image(100, 100))
            .to_rgb8()
            .save(&input)
            .unwrap();
        let output = dir.path().join("redacted_in.png");

        let detection = PIIDetection::new(
            PIIType::Email,
            bbox(10, 10, 60, 30),
            0.9,
            0,
            DetectionMethod::Nlp,
        )
        .unwrap();
        let mut by_page = BTreeMap::new();
        by_page.insert(0u32, vec![&detection]);

        let mut warnings = Vec::new();
        let redacted = redact_raster(
            &input,
            &output,
            &by_page,
            &RedactionProfile::named("p"),
            &mut warnings,
        )
        .unwrap();

        assert_eq!(redacted.len(), 1);
        assert!(warnings.is_empty());
        let saved = image::open(&output).unwrap().to_rgba8();
        assert_eq!(*saved.get_pixel(20, 20), Rgba([0, 0, 0, 255]));
    }
}
