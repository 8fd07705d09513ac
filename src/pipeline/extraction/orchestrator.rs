use std::path::Path;
use std::time::Instant;

use super::language_detect::{detect_language_codes, union_languages};
use super::ocr::language_hint;
use super::preprocess::ImageDownscaler;
use super::types::{
    FileKind, ImageTranscriber, OcrEngine, PdfPageRenderer, PdfTextExtractor, TextExtractor,
    Transcription,
};
use super::ExtractionError;
use crate::models::RawDocument;

/// One way of reading a file. Strategies of a kind are tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ImageVision,
    ImageOcr,
    PdfTextLayer,
    PdfPageVision,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageVision => "image-vision",
            Self::ImageOcr => "image-ocr",
            Self::PdfTextLayer => "pdf-text-layer",
            Self::PdfPageVision => "pdf-page-vision",
        }
    }
}

/// Fixed priority order per file kind.
pub fn strategies_for(kind: FileKind) -> &'static [Strategy] {
    match kind {
        FileKind::Image => &[Strategy::ImageVision, Strategy::ImageOcr],
        FileKind::Pdf => &[Strategy::PdfTextLayer, Strategy::PdfPageVision],
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    /// A strategy result shorter than this moves on to the next strategy.
    pub min_text_chars: usize,
    /// Configured document languages: OCR hint and last-resort language list.
    pub document_languages: Vec<String>,
    pub render_dpi: u32,
}

/// Extraction fallback chain.
///
/// Each strategy either yields a transcription that passes the
/// `min_text_chars` predicate or records why it did not; the next strategy
/// runs only in the latter case. The first passing result becomes the
/// `RawDocument`.
pub struct ExtractionChain {
    transcriber: Box<dyn ImageTranscriber + Send + Sync>,
    ocr: Box<dyn OcrEngine + Send + Sync>,
    pdf_text: Box<dyn PdfTextExtractor + Send + Sync>,
    renderer: Option<Box<dyn PdfPageRenderer + Send + Sync>>,
    downscaler: ImageDownscaler,
    settings: ExtractionSettings,
}

impl ExtractionChain {
    pub fn new(
        transcriber: Box<dyn ImageTranscriber + Send + Sync>,
        ocr: Box<dyn OcrEngine + Send + Sync>,
        pdf_text: Box<dyn PdfTextExtractor + Send + Sync>,
        downscaler: ImageDownscaler,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            transcriber,
            ocr,
            pdf_text,
            renderer: None,
            downscaler,
            settings,
        }
    }

    /// Enable the page-image fallback for PDFs without a usable text layer.
    pub fn with_pdf_renderer(mut self, renderer: Box<dyn PdfPageRenderer + Send + Sync>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    fn run(&self, strategy: Strategy, bytes: &[u8]) -> Result<Transcription, ExtractionError> {
        match strategy {
            Strategy::ImageVision => self.vision(bytes),
            Strategy::ImageOcr => self.ocr(bytes),
            Strategy::PdfTextLayer => {
                let text = self.pdf_text.extract_text(bytes)?;
                let languages = detect_language_codes(&text);
                Ok(Transcription { text, languages })
            }
            Strategy::PdfPageVision => self.page_vision(bytes),
        }
    }

    fn vision(&self, image_bytes: &[u8]) -> Result<Transcription, ExtractionError> {
        let fitted = self.downscaler.fit(image_bytes)?;
        self.transcriber.transcribe(&fitted)
    }

    fn ocr(&self, image_bytes: &[u8]) -> Result<Transcription, ExtractionError> {
        let _span = tracing::info_span!("ocr", image_size = image_bytes.len()).entered();
        let hint = language_hint(&self.settings.document_languages);
        let text = self.ocr.extract_text(image_bytes, &hint)?;

        let mut languages = detect_language_codes(&text);
        if languages.is_empty() {
            union_languages(&mut languages, &self.settings.document_languages);
        }
        Ok(Transcription { text, languages })
    }

    /// Render and transcribe every page exactly once. Any failing page fails
    /// the whole fallback.
    fn page_vision(&self, pdf_bytes: &[u8]) -> Result<Transcription, ExtractionError> {
        let renderer = self.renderer.as_ref().ok_or_else(|| ExtractionError::PdfRendering {
            page: 0,
            reason: "no page renderer available".to_string(),
        })?;

        let page_count = renderer.page_count(pdf_bytes)?;
        if page_count == 0 {
            return Err(ExtractionError::PdfParsing("document has no pages".to_string()));
        }

        let mut texts = Vec::with_capacity(page_count);
        let mut languages = Vec::new();
        for page in 0..page_count {
            let image = renderer.render_page(pdf_bytes, page, self.settings.render_dpi)?;
            let transcription = self.vision(&image)?;
            tracing::debug!(
                page = page + 1,
                pages = page_count,
                chars = transcription.char_count(),
                languages = ?transcription.languages,
                "Page transcribed"
            );
            union_languages(&mut languages, &transcription.languages);
            texts.push(transcription.text);
        }

        Ok(Transcription {
            text: texts.join("\n\n"),
            languages,
        })
    }
}

impl TextExtractor for ExtractionChain {
    fn extract(&self, path: &Path) -> Result<RawDocument, ExtractionError> {
        let kind = FileKind::from_path(path).ok_or_else(|| {
            ExtractionError::UnsupportedFormat(path.display().to_string())
        })?;
        let bytes = std::fs::read(path)?;
        let started = Instant::now();

        let mut attempts: Vec<String> = Vec::new();
        for &strategy in strategies_for(kind) {
            let outcome = self.run(strategy, &bytes).and_then(|t| {
                let chars = t.char_count();
                if chars < self.settings.min_text_chars {
                    Err(ExtractionError::BelowThreshold {
                        chars,
                        min: self.settings.min_text_chars,
                    })
                } else {
                    Ok(t)
                }
            });

            match outcome {
                Ok(transcription) => {
                    tracing::info!(
                        path = %path.display(),
                        kind = kind.as_str(),
                        strategy = strategy.as_str(),
                        chars = transcription.char_count(),
                        languages = ?transcription.languages,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Text extraction complete"
                    );
                    return Ok(RawDocument {
                        text: transcription.text,
                        languages: transcription.languages,
                        source_path: path.to_path_buf(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        strategy = strategy.as_str(),
                        error = %e,
                        "Extraction strategy failed, falling back"
                    );
                    attempts.push(format!("{}: {e}", strategy.as_str()));
                }
            }
        }

        Err(ExtractionError::Exhausted {
            attempts: attempts.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdf::MockPdfTextExtractor;
    use crate::pipeline::extraction::pdfium::{minimal_png, MockPdfPageRenderer};
    use crate::pipeline::extraction::vision::MockImageTranscriber;
    use std::sync::Arc;

    const GERMAN: &str = "Sehr geehrte Damen und Herren, die Rechnung für den Monat ist beigefügt.";

    fn settings() -> ExtractionSettings {
        ExtractionSettings {
            min_text_chars: 10,
            document_languages: vec!["en".into(), "de".into()],
            render_dpi: 144,
        }
    }

    fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn transcription(text: &str, langs: &[&str]) -> Result<Transcription, String> {
        Ok(Transcription {
            text: text.to_string(),
            languages: langs.iter().map(|l| l.to_string()).collect(),
        })
    }

    /// Shares a mock between the chain and the test body.
    struct Shared<T>(Arc<T>);

    impl<T: ImageTranscriber> ImageTranscriber for Shared<T> {
        fn transcribe(&self, b: &[u8]) -> Result<Transcription, ExtractionError> {
            self.0.transcribe(b)
        }
    }

    impl<T: OcrEngine> OcrEngine for Shared<T> {
        fn extract_text(&self, b: &[u8], hint: &str) -> Result<String, ExtractionError> {
            self.0.extract_text(b, hint)
        }
    }

    impl<T: PdfPageRenderer> PdfPageRenderer for Shared<T> {
        fn page_count(&self, b: &[u8]) -> Result<usize, ExtractionError> {
            self.0.page_count(b)
        }
        fn render_page(&self, b: &[u8], p: usize, dpi: u32) -> Result<Vec<u8>, ExtractionError> {
            self.0.render_page(b, p, dpi)
        }
    }

    #[test]
    fn strategy_order_per_kind() {
        assert_eq!(
            strategies_for(FileKind::Image),
            &[Strategy::ImageVision, Strategy::ImageOcr]
        );
        assert_eq!(
            strategies_for(FileKind::Pdf),
            &[Strategy::PdfTextLayer, Strategy::PdfPageVision]
        );
    }

    #[test]
    fn image_uses_vision_when_it_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.png", &minimal_png());
        let ocr = Arc::new(MockOcrEngine::new("unused ocr text"));
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![transcription(
                "Rechnung Nr. 114 über 120 EUR",
                &["de"],
            )])),
            Box::new(Shared(ocr.clone())),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        );

        let raw = chain.extract(&path).unwrap();
        assert_eq!(raw.text, "Rechnung Nr. 114 über 120 EUR");
        assert_eq!(raw.languages, vec!["de"]);
        assert_eq!(raw.source_path, path);
        assert!(ocr.hints().is_empty());
    }

    #[test]
    fn image_falls_back_to_ocr_with_document_languages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.jpg", &minimal_png());
        let ocr = Arc::new(MockOcrEngine::new(GERMAN));
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![Err("timeout".into())])),
            Box::new(Shared(ocr.clone())),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        );

        let raw = chain.extract(&path).unwrap();
        assert_eq!(raw.text, GERMAN);
        assert_eq!(raw.languages, vec!["de"]);
        assert_eq!(ocr.hints(), vec!["eng+deu"]);
    }

    #[test]
    fn ocr_text_without_detectable_language_uses_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "receipt.png", &minimal_png());
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![])),
            Box::new(MockOcrEngine::new("TOTAL 12.50 EUR 2023-04-01")),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        );

        let raw = chain.extract(&path).unwrap();
        assert_eq!(raw.languages, vec!["en", "de"]);
    }

    #[test]
    fn image_fails_when_both_strategies_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.png", &minimal_png());
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![Err("bad".into())])),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        );

        match chain.extract(&path) {
            Err(ExtractionError::Exhausted { attempts }) => {
                assert!(attempts.contains("image-vision"));
                assert!(attempts.contains("image-ocr"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn pdf_text_layer_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "invoice_2023.pdf", b"%PDF-1.4");
        let renderer = Arc::new(MockPdfPageRenderer::new(2));
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![])),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new(GERMAN)),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        )
        .with_pdf_renderer(Box::new(Shared(renderer.clone())));

        let raw = chain.extract(&path).unwrap();
        assert_eq!(raw.text, GERMAN);
        assert_eq!(raw.languages, vec!["de"]);
        assert!(renderer.rendered_pages().is_empty());
    }

    #[test]
    fn scanned_pdf_transcribes_each_page_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.pdf", b"%PDF-1.4");
        let renderer = Arc::new(MockPdfPageRenderer::new(2));
        let transcriber = Arc::new(MockImageTranscriber::new(vec![
            transcription("Rechnung Seite eins", &["de", "en"]),
            transcription("Invoice page two", &["en", "de", "fr"]),
        ]));
        let chain = ExtractionChain::new(
            Box::new(Shared(transcriber.clone())),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new("  ")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        )
        .with_pdf_renderer(Box::new(Shared(renderer.clone())));

        let raw = chain.extract(&path).unwrap();
        assert_eq!(raw.text, "Rechnung Seite eins\n\nInvoice page two");
        assert_eq!(raw.languages, vec!["de", "en", "fr"]);
        assert_eq!(renderer.rendered_pages(), vec![0, 1]);
        assert_eq!(transcriber.calls(), 2);
    }

    #[test]
    fn text_layer_parse_error_falls_back_to_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "broken.pdf", b"%PDF-1.4");
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::repeating("Kontoauszug März 2023", &["de"], 1)),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::failing()),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        )
        .with_pdf_renderer(Box::new(MockPdfPageRenderer::new(1)));

        let raw = chain.extract(&path).unwrap();
        assert_eq!(raw.text, "Kontoauszug März 2023");
    }

    #[test]
    fn failing_page_fails_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.pdf", b"%PDF-1.4");
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![
                transcription("first page text", &["en"]),
                Err("vision down".into()),
            ])),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        )
        .with_pdf_renderer(Box::new(MockPdfPageRenderer::new(2)));

        assert!(matches!(
            chain.extract(&path),
            Err(ExtractionError::Exhausted { .. })
        ));
    }

    #[test]
    fn short_page_text_fails_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "blank.pdf", b"%PDF-1.4");
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::repeating("ok", &[], 1)),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        )
        .with_pdf_renderer(Box::new(MockPdfPageRenderer::new(1)));

        match chain.extract(&path) {
            Err(ExtractionError::Exhausted { attempts }) => {
                assert!(attempts.contains("pdf-page-vision"));
                assert!(attempts.contains("too short"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn pdf_without_renderer_fails_after_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.pdf", b"%PDF-1.4");
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![])),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(5 * 1024 * 1024),
            settings(),
        );
        assert!(chain.extract(&path).is_err());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "notes.docx", b"x");
        let chain = ExtractionChain::new(
            Box::new(MockImageTranscriber::new(vec![])),
            Box::new(MockOcrEngine::failing()),
            Box::new(MockPdfTextExtractor::new("")),
            ImageDownscaler::new(1024),
            settings(),
        );
        assert!(matches!(
            chain.extract(&path),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
    }
}
