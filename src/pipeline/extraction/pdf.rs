use std::panic::{catch_unwind, AssertUnwindSafe};

use super::types::PdfTextExtractor;
use super::ExtractionError;

/// Text-layer extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text; scanned PDFs come back empty.
pub struct PdfTextLayer;

impl PdfTextExtractor for PdfTextLayer {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed font tables.
        let result = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(pdf_bytes)
        }))
        .map_err(|_| ExtractionError::PdfParsing("text extractor panicked".to_string()))?;

        result.map_err(|e| ExtractionError::PdfParsing(e.to_string()))
    }
}

/// Mock text layer returning a fixed result.
pub struct MockPdfTextExtractor {
    text: Option<String>,
}

impl MockPdfTextExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    /// A text layer that fails to parse.
    pub fn failing() -> Self {
        Self { text: None }
    }
}

impl PdfTextExtractor for MockPdfTextExtractor {
    fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
        self.text
            .clone()
            .ok_or_else(|| ExtractionError::PdfParsing("mock parse failure".to_string()))
    }
}
