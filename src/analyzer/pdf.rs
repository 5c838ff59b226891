//! PDF page extraction via lopdf.

use crate::analyzer::ExtractedPages;
use crate::error::{Error, ProcessingStage, Result};
use crate::models::document::PageInfo;
use lopdf::Object;
use serde_json::json;
use std::path::Path;

/// DPI assumed for PDF pages when rasterizing coordinates.
pub const PDF_DEFAULT_DPI: u32 = 150;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f64 = 72.0;

/// US Letter media box, used when a page carries none.
pub(crate) const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Extract page geometry and text from a PDF.
///
/// Pages that fail to decode are skipped and reported as warnings; the
/// caller decides whether zero surviving pages is fatal.
pub fn extract_pdf_pages(path: &Path) -> Result<ExtractedPages> {
    let doc = lopdf::Document::load(path).map_err(|e| {
        Error::document_processing(
            ProcessingStage::Analyze,
            path.display().to_string(),
            format!("PDF decode failed: {}", e),
        )
    })?;

    let mut pages = Vec::new();
    let mut warnings = Vec::new();

    for (index, (pdf_page_number, page_id)) in doc.get_pages().into_iter().enumerate() {
        match extract_single_page(&doc, pdf_page_number, page_id, index as u32) {
            Ok(page) => pages.push(page),
            Err(e) => warnings.push(format!("page {}: {}", index, e)),
        }
    }

    Ok(ExtractedPages { pages, warnings })
}

fn extract_single_page(
    doc: &lopdf::Document,
    pdf_page_number: u32,
    page_id: lopdf::ObjectId,
    page_number: u32,
) -> Result<PageInfo> {
    let dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| Error::Internal(format!("page object unreadable: {}", e)))?;

    let media_box = dict
        .get(b"MediaBox")
        .ok()
        .and_then(|obj| media_box_values(doc, obj))
        .unwrap_or(DEFAULT_MEDIA_BOX);

    let width_pts = (media_box[2] - media_box[0]).abs();
    let height_pts = (media_box[3] - media_box[1]).abs();

    let dpi = PDF_DEFAULT_DPI;
    let width = (width_pts / POINTS_PER_INCH * dpi as f64).round() as u32;
    let height = (height_pts / POINTS_PER_INCH * dpi as f64).round() as u32;

    let rotation = dict
        .get(b"Rotate")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .map(|r| (r.rem_euclid(360)) as u16)
        .filter(|r| matches!(r, 0 | 90 | 180 | 270))
        .unwrap_or(0);

    let text_content = doc
        .extract_text(&[pdf_page_number])
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let mut page = PageInfo::new(page_number, width, height, dpi);
    page.rotation = rotation;
    page.text_content = text_content;
    page.metadata.insert("width_points".to_string(), json!(width_pts));
    page.metadata.insert("height_points".to_string(), json!(height_pts));

    Ok(page)
}

/// Resolve a MediaBox array, following an indirect reference if needed.
pub(crate) fn media_box_values(doc: &lopdf::Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = match obj {
        Object::Array(arr) => arr.clone(),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?.clone(),
        _ => return None,
    };
    if arr.len() != 4 {
        return None;
    }

    let mut values = [0.0f64; 4];
    for (i, item) in arr.iter().enumerate() {
        values[i] = match item {
            Object::Integer(n) => *n as f64,
            Object::Real(r) => *r as f64,
            _ => return None,
        };
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Document as PdfDocument, Object, Stream};

    /// Build a minimal single-page PDF with the given media box.
    fn minimal_pdf(path: &Path, width: f64, height: f64, rotate: Option<i64>) {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content = lopdf::content::Content {
            operations: vec![],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
        };
        if let Some(r) = rotate {
            page_dict.set("Rotate", r);
        }
        let page_id = doc.add_object(page_dict);

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_extract_letter_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.pdf");
        minimal_pdf(&path, 612.0, 792.0, None);

        let extracted = extract_pdf_pages(&path).unwrap();
        assert_eq!(extracted.pages.len(), 1);
        let page = &extracted.pages[0];
        assert_eq!(page.page_number, 0);
        assert_eq!(page.dpi, PDF_DEFAULT_DPI);
        // 612 pt at 150 dpi = 1275 px
        assert_eq!(page.width, 1275);
        assert_eq!(page.height, 1650);
        assert_eq!(page.rotation, 0);
    }

    #[test]
    fn test_rotation_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.pdf");
        minimal_pdf(&path, 612.0, 792.0, Some(90));

        let extracted = extract_pdf_pages(&path).unwrap();
        assert_eq!(extracted.pages[0].rotation, 90);
    }

    #[test]
    fn test_garbage_pdf_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(extract_pdf_pages(&path).is_err());
    }
}
