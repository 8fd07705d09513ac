pub mod types;
pub mod language_detect;
pub mod preprocess;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod vision;
pub mod orchestrator;

pub use types::*;
pub use orchestrator::*;

use thiserror::Error;

use crate::pipeline::structuring::ModelError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file kind: {0}")]
    UnsupportedFormat(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is encrypted or password-protected")]
    PdfEncrypted,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Vision model failed: {0}")]
    Vision(#[from] ModelError),

    #[error("Vision model returned no text")]
    EmptyTranscription,

    #[error("Local OCR is not available in this build")]
    OcrUnavailable,

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata download for '{code}' failed: {reason}")]
    TessdataDownload { code: String, reason: String },

    #[error("Extracted text too short ({chars} < {min} chars)")]
    BelowThreshold { chars: usize, min: usize },

    /// Every strategy of the chain was tried without usable text.
    #[error("No usable text after {attempts}")]
    Exhausted { attempts: String },
}
