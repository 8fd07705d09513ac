//! PDF page rendering via Google PDFium.
//!
//! Renders individual PDF pages to PNG images for the page-by-page vision
//! fallback used on scanned PDFs without a usable text layer.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each operation creates
//! a fresh `Pdfium` instance because the upstream type is `!Send`.
//! The OS caches `dlopen` calls, so repeat loads are near-free.

use std::io::Cursor;
use std::sync::Mutex;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// Default rendering DPI for vision transcription.
pub const DEFAULT_RENDER_DPI: u32 = 200;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG images using Google PDFium.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a new renderer, verifying the PDFium library is loadable.
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path)
/// 2. Alongside the running executable, then `<exe_dir>/lib`
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings =
            Pdfium::bind_to_library(&path).map_err(|e| ExtractionError::PdfRendering {
                page: 0,
                reason: format!("Failed to load PDFium from {path}: {e}"),
            })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            for dir in [exe_dir.to_path_buf(), exe_dir.join("lib")] {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium next to executable");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings =
        Pdfium::bind_to_system_library().map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: format!(
                "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
            ),
        })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors, detecting encrypted PDFs.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDF: {e}"),
        }
    }
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// Load `pdf_bytes` once and hand the document to `f`.
fn with_document<T>(
    pdf_bytes: &[u8],
    f: impl FnOnce(&PdfDocument<'_>) -> Result<T, ExtractionError>,
) -> Result<T, ExtractionError> {
    let pdfium = load_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(map_load_error)?;
    f(&document)
}

fn page_error(page: usize, reason: impl Into<String>) -> ExtractionError {
    ExtractionError::PdfRendering {
        page,
        reason: reason.into(),
    }
}

/// Rasterize one loaded page and encode it as PNG.
fn page_to_png(page: &PdfPage<'_>, page_number: usize, dpi: u32) -> Result<Vec<u8>, ExtractionError> {
    let (width_pt, height_pt) = (page.width().value, page.height().value);
    let (width, height) = compute_render_dimensions(width_pt, height_pt, dpi);
    let scale = dpi as f32 / POINTS_PER_INCH;
    if (width_pt * scale) as u32 > width || (height_pt * scale) as u32 > height {
        warn!(
            page = page_number,
            dpi,
            width,
            height,
            "Page larger than {MAX_DIMENSION_PX}px, rendering scaled down"
        );
    }

    let config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| page_error(page_number, format!("Rendering failed: {e}")))?;

    let mut png = Cursor::new(Vec::new());
    bitmap
        .as_image()
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(png.into_inner())
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        with_document(pdf_bytes, |document| Ok(document.pages().len() as usize))
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let index = u16::try_from(page_number)
            .map_err(|_| page_error(page_number, "page index beyond PDFium's u16 range"))?;

        let png = with_document(pdf_bytes, |document| {
            let pages = document.pages();
            let page = pages.get(index).map_err(|_| {
                page_error(
                    page_number,
                    format!("out of range, document has {} pages", pages.len()),
                )
            })?;
            page_to_png(&page, page_number, dpi)
        })?;

        debug!(page = page_number, dpi, png_size = png.len(), "Rendered PDF page");
        Ok(png)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock renderer returning a minimal PNG per page and recording which
/// pages were rendered.
pub struct MockPdfPageRenderer {
    page_count: usize,
    rendered: Mutex<Vec<usize>>,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            rendered: Mutex::new(Vec::new()),
        }
    }

    /// Pages rendered so far, in call order.
    pub fn rendered_pages(&self) -> Vec<usize> {
        self.rendered.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_number: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if page_number >= self.page_count {
            return Err(ExtractionError::PdfRendering {
                page: page_number,
                reason: format!(
                    "Page {page_number} out of range (mock has {} pages)",
                    self.page_count
                ),
            });
        }
        if let Ok(mut rendered) = self.rendered.lock() {
            rendered.push(page_number);
        }
        Ok(minimal_png())
    }
}

/// Minimal valid 1x1 white pixel PNG for mock testing.
pub fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // 8-bit RGB
        0xDE, // IHDR CRC
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, // compressed
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, // IDAT CRC
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND chunk
        0xAE, 0x42, 0x60, 0x82, // IEND CRC
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_at_double_scale() {
        // US Letter: 612 x 792 points
        let (w, h) = compute_render_dimensions(612.0, 792.0, 144);
        assert_eq!((w, h), (1224, 1584));
    }

    #[test]
    fn oversized_page_is_capped() {
        let (w, h) = compute_render_dimensions(5000.0, 2500.0, 300);
        assert!(w <= MAX_DIMENSION_PX && w >= MAX_DIMENSION_PX - 1, "w={w}");
        assert!(h.abs_diff(MAX_DIMENSION_PX / 2) <= 1, "h={h}");
    }

    #[test]
    fn degenerate_page_is_at_least_one_pixel() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 200);
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn mock_records_rendered_pages() {
        let renderer = MockPdfPageRenderer::new(2);
        renderer.render_page(b"", 1, 200).unwrap();
        renderer.render_page(b"", 0, 200).unwrap();
        assert!(renderer.render_page(b"", 2, 200).is_err());
        assert_eq!(renderer.rendered_pages(), vec![1, 0]);
    }

    #[test]
    fn mock_png_has_signature() {
        assert_eq!(&minimal_png()[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }
}
