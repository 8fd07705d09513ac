use std::path::Path;

use crate::models::RawDocument;

use super::ExtractionError;

/// How a source file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Single raster image (photo, scan).
    Image,
    /// Paged document with an optional text layer.
    Pdf,
}

impl FileKind {
    /// Classify by normalized extension (`.pdf`, `.jpg`, ...).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" | "png" | "tif" | "tiff" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }
}

/// Text read from one image or page, with the languages seen in it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcription {
    pub text: String,
    /// ISO 639-1 codes, may be empty.
    pub languages: Vec<String>,
}

impl Transcription {
    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// Local OCR engine.
pub trait OcrEngine {
    /// `language_hint` is a Tesseract language spec such as `eng+deu`.
    fn extract_text(&self, image_bytes: &[u8], language_hint: &str)
        -> Result<String, ExtractionError>;
}

/// Direct text-layer extraction from PDF bytes.
pub trait PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Renders individual PDF pages to images.
pub trait PdfPageRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Render one page (0-based) to encoded image bytes.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// Reads an image through the model's vision capability.
pub trait ImageTranscriber {
    fn transcribe(&self, image_bytes: &[u8]) -> Result<Transcription, ExtractionError>;
}

/// Turns one source file into a `RawDocument`.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<RawDocument, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_from_extension() {
        assert_eq!(FileKind::from_extension(".pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_extension("JPEG"), Some(FileKind::Image));
        assert_eq!(FileKind::from_extension(".png"), Some(FileKind::Image));
        assert_eq!(FileKind::from_extension(".docx"), None);
    }

    #[test]
    fn kind_from_path() {
        assert_eq!(
            FileKind::from_path(Path::new("/in/scan.JPG")),
            Some(FileKind::Image)
        );
        assert_eq!(FileKind::from_path(Path::new("/in/README")), None);
    }

    #[test]
    fn char_count_ignores_surrounding_whitespace() {
        let t = Transcription {
            text: "  héllo \n".into(),
            languages: vec![],
        };
        assert_eq!(t.char_count(), 5);
    }
}
