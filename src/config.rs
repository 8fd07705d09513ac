//! Application configuration.
//!
//! Loaded once at startup from a JSON file. Every field carries a serde
//! default, so a partial file (or no file at all) yields a runnable setup
//! against a local Ollama and Weaviate.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "docsort";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "docsort=info"
}

/// Tracing filter used with `--verbose`.
pub fn verbose_log_filter() -> &'static str {
    "docsort=debug"
}

/// Application data directory (`~/.local/share/docsort` on Linux).
///
/// Falls back to `./.docsort` when the platform reports no data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".docsort"))
}

/// Tesseract language data directory.
pub fn tessdata_dir() -> PathBuf {
    app_data_dir().join("tessdata")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Which model backend serves text and vision completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    #[default]
    Ollama,
    /// Any server speaking the OpenAI chat-completions protocol.
    Openai,
}

/// Model backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub base_url: String,
    /// Model used for structuring and translation.
    pub text_model: String,
    /// Model used for image transcription.
    pub vision_model: String,
    /// Environment variable holding the API key (openai provider only).
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            text_model: "llama3.1:8b".to_string(),
            vision_model: "llama3.2-vision:11b".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 300,
            temperature: 0.0,
        }
    }
}

/// Vector store (Weaviate) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    pub embedding_model: String,
    /// Ollama endpoint as seen from the Weaviate container.
    pub vectorizer_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            collection: "Documents".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            vectorizer_endpoint: "http://host.docker.internal:11434".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Local OCR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tessdata_dir: PathBuf,
    /// Fetch missing `.traineddata` files on first use.
    pub download_missing: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tessdata_dir: tessdata_dir(),
            download_missing: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tree walked for incoming documents.
    pub source_directory: PathBuf,
    /// Root of the organised layout files are moved into.
    pub organised_directory: PathBuf,
    /// Recognized extensions. Normalized to `.ext` lower case on load.
    pub extensions: Vec<String>,
    /// Directory names never descended into (case-insensitive).
    pub excluded_directories: Vec<String>,
    /// Directories whose name starts with this marker are skipped.
    pub hidden_marker: String,
    /// ISO 639-1 code of the language documents are summarized in.
    pub user_language: String,
    /// ISO 639-1 codes expected in documents; drives local OCR.
    pub document_languages: Vec<String>,
    /// Offset applied to naive timestamps, e.g. `+01:00`.
    pub timezone_offset: String,
    pub image_size_limit_mb: f64,
    /// Extracted text shorter than this counts as no text.
    pub min_text_chars: usize,
    /// Context window of the text model, in tokens.
    pub context_length_tokens: usize,
    pub chars_per_token: usize,
    pub render_dpi: u32,
    pub database_path: PathBuf,
    /// JSON file holding the category and tag registries.
    pub registry_file: PathBuf,
    /// ERROR-level log sink. Empty disables it.
    pub error_log: PathBuf,
    /// Site-specific rules appended to the fixed organisational rules.
    pub organisation_instructions: String,
    pub model: ModelConfig,
    pub vector_store: VectorStoreConfig,
    pub ocr: OcrConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("inbox"),
            organised_directory: PathBuf::from("organised"),
            extensions: vec![
                ".pdf".to_string(),
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".png".to_string(),
            ],
            excluded_directories: Vec::new(),
            hidden_marker: ".".to_string(),
            user_language: "en".to_string(),
            document_languages: vec!["en".to_string(), "de".to_string()],
            timezone_offset: "+01:00".to_string(),
            image_size_limit_mb: 5.0,
            min_text_chars: 10,
            context_length_tokens: 16_000,
            chars_per_token: 4,
            render_dpi: crate::pipeline::extraction::pdfium::DEFAULT_RENDER_DPI,
            database_path: PathBuf::from("documents.db"),
            registry_file: PathBuf::from("registry.json"),
            error_log: PathBuf::from("errors.log"),
            organisation_instructions: String::new(),
            model: ModelConfig::default(),
            vector_store: VectorStoreConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate a config file.
    ///
    /// When `explicit` is false a missing file yields the defaults; an
    /// explicitly requested file must exist.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<AppConfig>(&raw).map_err(|source| {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                AppConfig::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.normalized().validate()
    }

    /// Lower-case languages and extensions, add the leading dot.
    pub fn normalized(mut self) -> Self {
        self.extensions = self
            .extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| e.len() > 1)
            .collect();
        self.user_language = self.user_language.trim().to_lowercase();
        self.document_languages = self
            .document_languages
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        self
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.user_language.is_empty() {
            return Err(ConfigError::Invalid {
                field: "user_language",
                reason: "must not be empty".to_string(),
            });
        }
        if self.image_size_limit_mb <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "image_size_limit_mb",
                reason: format!("must be positive, got {}", self.image_size_limit_mb),
            });
        }
        if self.chars_per_token == 0 {
            return Err(ConfigError::Invalid {
                field: "chars_per_token",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid {
                field: "extensions",
                reason: "no recognized extensions".to_string(),
            });
        }
        self.timezone()?;
        Ok(self)
    }

    /// Fixed offset used to localize naive timestamps.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        parse_offset(&self.timezone_offset).ok_or_else(|| ConfigError::Invalid {
            field: "timezone_offset",
            reason: format!("expected +HH:MM or -HH:MM, got {:?}", self.timezone_offset),
        })
    }

    /// Size ceiling for images handed to the vision model, in bytes.
    pub fn image_size_limit_bytes(&self) -> usize {
        (self.image_size_limit_mb * 1024.0 * 1024.0) as usize
    }
}

/// `PDF`, `pdf`, `.Pdf` all become `.pdf`.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    format!(".{}", trimmed.to_lowercase())
}

/// Parse `+HH:MM`, `-HH:MM`, `Z` or `UTC`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
