//! PDF access: embedded-text extraction via `lopdf` (spec 4.4 step 2, "read
//! the binary's native text stream and count pages. This never fails for
//! well-formed inputs") and page rasterization via `pdfium-render` (step 5,
//! vision-OCR fallback).

use std::path::Path;

use pdfium_render::prelude::*;

use crate::error::{ExtractError, ExtractResult};

/// Concatenated embedded text (one page per entry, in page order) and the
/// page count. A page whose content stream cannot be decoded contributes an
/// empty string rather than aborting the whole document.
pub fn extract_embedded_text(pdf_path: &Path) -> ExtractResult<(Vec<String>, i32)> {
    let doc = lopdf::Document::load(pdf_path)
        .map_err(|e| ExtractError::PdfOpen(format!("{}: {e}", pdf_path.display())))?;

    let pages = doc.get_pages();
    let page_count = pages.len() as i32;

    let mut texts = Vec::with_capacity(pages.len());
    for (page_num, _) in pages {
        let text = doc.extract_text(&[page_num]).unwrap_or_default();
        texts.push(text);
    }

    Ok((texts, page_count))
}

/// Render one page (0-indexed) to PNG bytes at `dpi`.
pub fn render_page_png(pdf_path: &Path, page_index: u16, dpi: u32) -> ExtractResult<Vec<u8>> {
    let render = |detail: String| ExtractError::Render {
        page: page_index as u32,
        dpi,
        detail,
    };

    let bindings = Pdfium::bind_to_system_library().map_err(|e| render(e.to_string()))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ExtractError::PdfOpen(format!("{}: {e}", pdf_path.display())))?;

    let page = document.pages().get(page_index).map_err(|e| render(e.to_string()))?;

    let scale = dpi as f32 / 72.0;
    let width = ((page.width().value * scale) as i32).max(1);
    let height = ((page.height().value * scale) as i32).max(1);

    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height);

    let bitmap = page.render_with_config(&config).map_err(|e| render(e.to_string()))?;
    let image = bitmap.as_image();

    let mut bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|e| render(e.to_string()))?;
    Ok(bytes)
}

/// Number of pages in the PDF, via pdfium (used by the Verifier, which does
/// not need the embedded text layer).
pub fn page_count(pdf_path: &Path) -> ExtractResult<u16> {
    let bindings =
        Pdfium::bind_to_system_library().map_err(|e| ExtractError::PdfOpen(e.to_string()))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ExtractError::PdfOpen(format!("{}: {e}", pdf_path.display())))?;
    Ok(document.pages().len())
}
