//! PDF redaction: rectangles burned into page content streams.
//!
//! Redaction rectangles are appended as a new content stream after the
//! existing page content, which paints them over everything underneath and
//! survives re-save. This is the irreversible equivalent of adding a
//! redaction annotation and applying it.

use crate::analyzer::pdf::{media_box_values, DEFAULT_MEDIA_BOX, PDF_DEFAULT_DPI};
use crate::error::{Error, ProcessingStage, Result};
use crate::models::pii::PIIDetection;
use crate::models::profile::{RedactionProfile, RedactionStyle};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f64 = 72.0;

/// Redact a PDF by painting opaque rectangles over each detection.
///
/// Detections on pages past the document's page count are skipped with a
/// warning; a page whose content stream cannot be updated is skipped
/// likewise. Failure of every page fails the document.
pub fn redact_pdf(
    input: &Path,
    output: &Path,
    by_page: &BTreeMap<u32, Vec<&PIIDetection>>,
    profile: &RedactionProfile,
    warnings: &mut Vec<String>,
) -> Result<Vec<PIIDetection>> {
    let mut doc = lopdf::Document::load(input).map_err(|e| {
        Error::document_processing(
            ProcessingStage::Redact,
            input.display().to_string(),
            format!("PDF decode failed: {}", e),
        )
    })?;

    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let page_ids: Vec<lopdf::ObjectId> = pages.values().copied().collect();

    // Pattern's solid-black fallback is part of its contract; pixelated and
    // blurred requests lose their rendition here and the caller is told.
    if !by_page.is_empty()
        && matches!(
            profile.redaction_style,
            RedactionStyle::Pixelated | RedactionStyle::Blurred
        )
    {
        warnings.push(format!(
            "style {} is not expressible in PDF content streams; regions were painted solid_black",
            profile.redaction_style
        ));
    }

    let mut redacted = Vec::new();
    let mut attempted_pages = 0usize;
    let mut failed_pages = 0usize;

    for (&page, detections) in by_page {
        if page >= page_count {
            warnings.push(format!(
                "page {} out of range for {}-page document; skipped {} detections",
                page,
                page_count,
                detections.len()
            ));
            continue;
        }

        attempted_pages += 1;
        let page_id = page_ids[page as usize];
        match redact_page(&mut doc, page_id, detections, profile.redaction_style) {
            Ok(()) => redacted.extend(detections.iter().map(|d| (*d).clone())),
            Err(e) => {
                failed_pages += 1;
                warnings.push(format!("page {}: {}", page, e));
            }
        }
    }

    if attempted_pages > 0 && failed_pages == attempted_pages {
        return Err(Error::document_processing(
            ProcessingStage::Redact,
            input.display().to_string(),
            "every page failed to redact",
        ));
    }

    doc.save(output).map_err(|e| {
        Error::document_processing(
            ProcessingStage::Redact,
            output.display().to_string(),
            format!("PDF save failed: {}", e),
        )
    })?;

    debug!(
        "PDF redaction wrote {} ({} regions)",
        output.display(),
        redacted.len()
    );
    Ok(redacted)
}

/// Append a rectangle-painting content stream to one page.
fn redact_page(
    doc: &mut lopdf::Document,
    page_id: lopdf::ObjectId,
    detections: &[&PIIDetection],
    style: RedactionStyle,
) -> Result<()> {
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::Internal(format!("page dictionary unreadable: {}", e)))?;

    let media_box = page_dict
        .get(b"MediaBox")
        .ok()
        .and_then(|obj| media_box_values(doc, obj))
        .unwrap_or(DEFAULT_MEDIA_BOX);
    let page_height_pts = (media_box[3] - media_box[1]).abs();

    let existing_contents = page_dict.get(b"Contents").ok().cloned();

    let content = Content {
        operations: rectangle_operations(detections, page_height_pts, style),
    };
    let stream = Stream::new(
        dictionary! {},
        content
            .encode()
            .map_err(|e| Error::Internal(format!("content encode failed: {}", e)))?,
    );
    let overlay_id = doc.add_object(stream);

    // Append after the existing content so the rectangles paint on top.
    let mut contents_array: Vec<Object> = match existing_contents {
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => vec![Object::Reference(id)],
        Some(other) => vec![other],
        None => Vec::new(),
    };
    contents_array.push(Object::Reference(overlay_id));

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::Internal(format!("page dictionary unwritable: {}", e)))?;
    page_dict.set("Contents", Object::Array(contents_array));

    Ok(())
}

/// Build fill operations for every detection rectangle.
///
/// Solid white keeps its color; all other styles paint solid black, the
/// only rendition a content stream can express irreversibly.
fn rectangle_operations(
    detections: &[&PIIDetection],
    page_height_pts: f64,
    style: RedactionStyle,
) -> Vec<Operation> {
    let (r, g, b) = match style {
        RedactionStyle::SolidWhite => (1.0, 1.0, 1.0),
        _ => (0.0, 0.0, 0.0),
    };
    let scale = POINTS_PER_INCH / PDF_DEFAULT_DPI as f64;

    let mut ops = vec![Operation::new("q", vec![])];
    ops.push(Operation::new(
        "rg",
        vec![
            Object::Real(r as f32),
            Object::Real(g as f32),
            Object::Real(b as f32),
        ],
    ));

    for d in detections {
        let x = d.bounding_box.x1 as f64 * scale;
        let w = d.bounding_box.width() as f64 * scale;
        let h = d.bounding_box.height() as f64 * scale;
        // Pixel origin is top-left; PDF user space is bottom-left.
        let y = page_height_pts - d.bounding_box.y2 as f64 * scale;

        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x as f32),
                Object::Real(y as f32),
                Object::Real(w as f32),
                Object::Real(h as f32),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
    }

    ops.push(Operation::new("Q", vec![]));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pii::{BoundingBox, DetectionMethod, PIIType};
    use lopdf::Document as PdfDocument;

    fn minimal_pdf(path: &Path) {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            Content { operations: vec![] }.encode().unwrap(),
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(612.0),
                Object::Real(792.0),
            ],
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn detection(page: u32) -> PIIDetection {
        PIIDetection::new(
            PIIType::Name,
            BoundingBox::new(100, 100, 400, 160).unwrap(),
            0.9,
            page,
            DetectionMethod::Nlp,
        )
        .unwrap()
    }

    #[test]
    fn test_redact_pdf_appends_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("redacted_doc.pdf");
        minimal_pdf(&input);

        let d = detection(0);
        let mut by_page = BTreeMap::new();
        by_page.insert(0u32, vec![&d]);
        let mut warnings = Vec::new();

        let redacted = redact_pdf(
            &input,
            &output,
            &by_page,
            &RedactionProfile::named("p"),
            &mut warnings,
        )
        .unwrap();
        assert_eq!(redacted.len(), 1);
        assert!(warnings.is_empty());

        // The saved page now carries two content streams with a fill op.
        let saved = PdfDocument::load(&output).unwrap();
        let (_, page_id) = saved.get_pages().into_iter().next().unwrap();
        let contents = saved
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(contents.len(), 2);

        let decoded = saved.get_page_content(page_id).unwrap();
        let content = Content::decode(&decoded).unwrap();
        assert!(content.operations.iter().any(|op| op.operator == "re"));
        assert!(content.operations.iter().any(|op| op.operator == "f"));
    }

    #[test]
    fn test_blurred_style_downgrade_warns() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("redacted_doc.pdf");
        minimal_pdf(&input);

        let d = detection(0);
        let mut by_page = BTreeMap::new();
        by_page.insert(0u32, vec![&d]);

        let mut profile = RedactionProfile::named("p");
        profile.redaction_style = RedactionStyle::Blurred;
        let mut warnings = Vec::new();

        let redacted = redact_pdf(&input, &output, &by_page, &profile, &mut warnings).unwrap();
        assert_eq!(redacted.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("blurred"));
        assert!(warnings[0].contains("solid_black"));
    }

    #[test]
    fn test_pattern_fallback_stays_silent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("redacted_doc.pdf");
        minimal_pdf(&input);

        let d = detection(0);
        let mut by_page = BTreeMap::new();
        by_page.insert(0u32, vec![&d]);

        let mut profile = RedactionProfile::named("p");
        profile.redaction_style = RedactionStyle::Pattern;
        let mut warnings = Vec::new();

        redact_pdf(&input, &output, &by_page, &profile, &mut warnings).unwrap();
        // Solid black is pattern's documented fallback, not a downgrade.
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_out_of_range_page_warning() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("redacted_doc.pdf");
        minimal_pdf(&input);

        let d = detection(3);
        let mut by_page = BTreeMap::new();
        by_page.insert(3u32, vec![&d]);
        let mut warnings = Vec::new();

        let redacted = redact_pdf(
            &input,
            &output,
            &by_page,
            &RedactionProfile::named("p"),
            &mut warnings,
        )
        .unwrap();
        assert!(redacted.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(output.exists());
    }

    #[test]
    fn test_rectangle_coordinates_flip_y() {
        let d = detection(0);
        let list = [&d];
        let ops = rectangle_operations(&list, 792.0, RedactionStyle::SolidBlack);

        let re_op = ops.iter().find(|op| op.operator == "re").unwrap();
        let x = re_op.operands[0].as_float().unwrap() as f64;
        let y = re_op.operands[1].as_float().unwrap() as f64;
        // 100 px at 150 dpi = 48 pt; y2 = 160 px -> 792 - 76.8
        assert!((x - 48.0).abs() < 0.1);
        assert!((y - (792.0 - 76.8)).abs() < 0.1);
    }
}
