//! Image transcription through the model's vision capability.
//!
//! The model returns the verbatim text plus the languages it saw. When it
//! reports no languages, the local detector runs over the transcription.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;

use super::language_detect::{detect_language_codes, union_languages};
use super::types::{ImageTranscriber, Transcription};
use super::ExtractionError;
use crate::pipeline::structuring::prompt::{transcription_schema, TRANSCRIPTION_PROMPT};
use crate::pipeline::structuring::ModelBackend;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    langs: Vec<String>,
}

pub struct VisionTranscriber {
    backend: Arc<dyn ModelBackend + Send + Sync>,
}

impl VisionTranscriber {
    pub fn new(backend: Arc<dyn ModelBackend + Send + Sync>) -> Self {
        Self { backend }
    }
}

impl ImageTranscriber for VisionTranscriber {
    fn transcribe(&self, image_bytes: &[u8]) -> Result<Transcription, ExtractionError> {
        let _span = tracing::info_span!("vision_transcribe", image_size = image_bytes.len()).entered();
        let started = Instant::now();

        let value =
            self.backend
                .complete_vision(TRANSCRIPTION_PROMPT, image_bytes, &transcription_schema())?;
        let response: TranscriptionResponse = serde_json::from_value(value).map_err(|e| {
            ExtractionError::Vision(crate::pipeline::structuring::ModelError::MalformedOutput(
                e.to_string(),
            ))
        })?;

        let text = response.text.trim().to_string();
        if text.is_empty() {
            return Err(ExtractionError::EmptyTranscription);
        }

        let mut languages = Vec::new();
        union_languages(&mut languages, &response.langs);
        if languages.is_empty() {
            languages = detect_language_codes(&text);
        }

        tracing::info!(
            chars = text.chars().count(),
            languages = ?languages,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Vision transcription complete"
        );

        Ok(Transcription { text, languages })
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock transcriber replaying scripted results, one per call.
pub struct MockImageTranscriber {
    results: Mutex<Vec<Result<Transcription, String>>>,
    calls: Mutex<usize>,
}

impl MockImageTranscriber {
    pub fn new(results: Vec<Result<Transcription, String>>) -> Self {
        let mut results = results;
        results.reverse();
        Self {
            results: Mutex::new(results),
            calls: Mutex::new(0),
        }
    }

    /// Every call succeeds with the same text and languages.
    pub fn repeating(text: &str, languages: &[&str], times: usize) -> Self {
        let t = Transcription {
            text: text.to_string(),
            languages: languages.iter().map(|l| l.to_string()).collect(),
        };
        Self::new((0..times).map(|_| Ok(t.clone())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

impl ImageTranscriber for MockImageTranscriber {
    fn transcribe(&self, _image_bytes: &[u8]) -> Result<Transcription, ExtractionError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        let next = self.results.lock().ok().and_then(|mut r| r.pop());
        match next {
            Some(Ok(t)) => Ok(t),
            Some(Err(_)) | None => Err(ExtractionError::EmptyTranscription),
        }
    }
}
