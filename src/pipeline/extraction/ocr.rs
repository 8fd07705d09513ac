//! Local OCR fallback.
//!
//! Tesseract needs one `.traineddata` file per language. `TessdataStore`
//! provisions them on first use from the upstream tessdata repository, so a
//! fresh install only downloads the languages it actually meets.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::types::OcrEngine;
use super::ExtractionError;
use crate::config::OcrConfig;

pub const TESSDATA_BASE_URL: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// ISO 639-1 → Tesseract language code.
pub fn tesseract_code(iso: &str) -> Option<&'static str> {
    match iso.trim().to_lowercase().as_str() {
        "en" => Some("eng"),
        "de" => Some("deu"),
        "fr" => Some("fra"),
        "es" => Some("spa"),
        "it" => Some("ita"),
        "pt" => Some("por"),
        "nl" => Some("nld"),
        "ru" => Some("rus"),
        "bg" => Some("bul"),
        "ro" => Some("ron"),
        _ => None,
    }
}

/// Tesseract language spec (`eng+deu`) for the configured document
/// languages. Unknown codes are skipped; an empty result falls back to `eng`.
pub fn language_hint(languages: &[String]) -> String {
    let mut codes: Vec<&str> = Vec::new();
    for lang in languages {
        match tesseract_code(lang) {
            Some(code) if !codes.contains(&code) => codes.push(code),
            Some(_) => {}
            None => tracing::warn!(language = %lang, "No Tesseract model for language"),
        }
    }
    if codes.is_empty() {
        "eng".to_string()
    } else {
        codes.join("+")
    }
}

/// Directory of `.traineddata` files with on-demand download.
pub struct TessdataStore {
    dir: PathBuf,
    base_url: String,
    download_missing: bool,
}

impl TessdataStore {
    pub fn new(dir: &Path, download_missing: bool) -> Self {
        Self {
            dir: dir.to_path_buf(),
            base_url: TESSDATA_BASE_URL.to_string(),
            download_missing,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.traineddata"))
    }

    /// Make sure every language of a `eng+deu` spec is present.
    pub fn ensure_all(&self, language_hint: &str) -> Result<(), ExtractionError> {
        for code in language_hint.split('+').filter(|c| !c.is_empty()) {
            self.ensure(code)?;
        }
        Ok(())
    }

    /// Return the model path, downloading it first if absent. Idempotent.
    pub fn ensure(&self, code: &str) -> Result<PathBuf, ExtractionError> {
        let path = self.path_for(code);
        if path.exists() {
            return Ok(path);
        }

        let fail = |reason: String| ExtractionError::TessdataDownload {
            code: code.to_string(),
            reason,
        };

        if !self.download_missing {
            return Err(fail(format!(
                "{} missing and downloads are disabled",
                path.display()
            )));
        }

        std::fs::create_dir_all(&self.dir)?;
        let url = format!("{}/{code}.traineddata", self.base_url);
        tracing::info!(code, url = %url, "Downloading Tesseract language data");

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| fail(e.to_string()))?;
        let response = client.get(&url).send().map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }
        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;

        // Write next to the target and rename, so a partial download never
        // looks like a valid model.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| fail(e.to_string()))?;

        tracing::info!(code, size = bytes.len(), "Tesseract language data installed");
        Ok(path)
    }
}

/// Tesseract-backed OCR engine.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    store: TessdataStore,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new(store: TessdataStore) -> Self {
        Self { store }
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn extract_text(
        &self,
        image_bytes: &[u8],
        language_hint: &str,
    ) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("tesseract_ocr", lang = %language_hint).entered();
        self.store.ensure_all(language_hint)?;

        let tessdata_str = self
            .store
            .dir()
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(language_hint))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        tess.get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))
    }
}

/// Stand-in used when the crate is built without the `ocr` feature.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn extract_text(
        &self,
        _image_bytes: &[u8],
        _language_hint: &str,
    ) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrUnavailable)
    }
}

/// The OCR engine this build supports.
pub fn build_ocr_engine(config: &OcrConfig) -> Box<dyn OcrEngine + Send + Sync> {
    let store = TessdataStore::new(&config.tessdata_dir, config.download_missing);
    #[cfg(feature = "ocr")]
    {
        Box::new(TesseractOcr::new(store))
    }
    #[cfg(not(feature = "ocr"))]
    {
        tracing::debug!(
            tessdata = %store.dir().display(),
            "Built without the ocr feature, local OCR disabled"
        );
        Box::new(UnavailableOcr)
    }
}

/// Mock OCR engine for testing. Records the language hints it receives.
pub struct MockOcrEngine {
    text: Option<String>,
    hints: Mutex<Vec<String>>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn hints(&self) -> Vec<String> {
        self.hints.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl OcrEngine for MockOcrEngine {
    fn extract_text(
        &self,
        _image_bytes: &[u8],
        language_hint: &str,
    ) -> Result<String, ExtractionError> {
        if let Ok(mut hints) = self.hints.lock() {
            hints.push(language_hint.to_string());
        }
        self.text
            .clone()
            .ok_or_else(|| ExtractionError::OcrProcessing("mock OCR failure".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn maps_iso_codes() {
        assert_eq!(tesseract_code("en"), Some("eng"));
        assert_eq!(tesseract_code("DE"), Some("deu"));
        assert_eq!(tesseract_code("bg"), Some("bul"));
        assert_eq!(tesseract_code("ro"), Some("ron"));
        assert_eq!(tesseract_code("xx"), None);
    }

    #[test]
    fn hint_joins_known_codes() {
        assert_eq!(language_hint(&langs(&["en", "de"])), "eng+deu");
        assert_eq!(language_hint(&langs(&["en", "xx", "en"])), "eng");
    }

    #[test]
    fn empty_hint_defaults_to_english() {
        assert_eq!(language_hint(&[]), "eng");
        assert_eq!(language_hint(&langs(&["xx"])), "eng");
    }

    #[test]
    fn ensure_is_noop_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"model").unwrap();

        // Unroutable base URL: any download attempt would fail.
        let store = TessdataStore::new(dir.path(), true).with_base_url("http://127.0.0.1:9");
        let path = store.ensure("eng").unwrap();
        assert_eq!(path, dir.path().join("eng.traineddata"));
        assert_eq!(std::fs::read(&path).unwrap(), b"model");
    }

    #[test]
    fn ensure_all_splits_spec() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"a").unwrap();
        std::fs::write(dir.path().join("deu.traineddata"), b"b").unwrap();
        let store = TessdataStore::new(dir.path(), false);
        assert!(store.ensure_all("eng+deu").is_ok());
    }

    #[test]
    fn missing_model_without_download_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TessdataStore::new(dir.path(), false);
        let err = store.ensure("deu").unwrap_err();
        assert!(matches!(err, ExtractionError::TessdataDownload { .. }));
        assert!(!dir.path().join("deu.traineddata").exists());
    }

    #[test]
    fn failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TessdataStore::new(dir.path(), true).with_base_url("http://127.0.0.1:9");
        assert!(store.ensure("fra").is_err());
        assert!(!dir.path().join("fra.traineddata").exists());
    }

    #[test]
    fn unavailable_engine_reports_unavailable() {
        let err = UnavailableOcr.extract_text(b"", "eng").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable));
    }

    #[test]
    fn mock_records_hints() {
        let mock = MockOcrEngine::new("text");
        mock.extract_text(b"", "eng+deu").unwrap();
        assert_eq!(mock.hints(), vec!["eng+deu"]);
        assert!(MockOcrEngine::failing().extract_text(b"", "eng").is_err());
    }
}
