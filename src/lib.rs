pub mod cli;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod pipeline;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use cli::{Cli, Commands};
use config::{AppConfig, ConfigError, ModelProvider};
use db::{DatabaseError, DocumentStore, SqliteDocumentStore};
use pipeline::extraction::ocr::build_ocr_engine;
use pipeline::extraction::pdf::PdfTextLayer;
use pipeline::extraction::pdfium::PdfiumRenderer;
use pipeline::extraction::preprocess::ImageDownscaler;
use pipeline::extraction::vision::VisionTranscriber;
use pipeline::extraction::{ExtractionChain, ExtractionError, ExtractionSettings, TextExtractor};
use pipeline::identity::derive_identity;
use pipeline::registry::JsonFileRegistry;
use pipeline::storage::weaviate::WeaviateClient;
use pipeline::storage::{
    FsMover, PersistSettings, PersistenceCoordinator, StorageError, EMBEDDING_SOURCE,
};
use pipeline::structuring::{
    DocumentStructurer, ModelBackend, ModelError, OllamaClient, OpenAiClient,
};
use pipeline::tree::DirectoryTreeSnapshot;
use pipeline::{DriverSettings, PipelineDriver, PipelineError, RunSummary};

/// Anything that ends a command early.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Vector store: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl AppError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Parse arguments, set up logging and run the chosen command.
pub fn run() -> ExitCode {
    let cli = cli::parse_args();
    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE));

    let loaded = AppConfig::load(&config_path, explicit);
    let error_log = loaded.as_ref().ok().map(|c| c.error_log.clone());
    if let Err(e) = logging::init_tracing(cli.verbose, error_log.as_deref()) {
        eprintln!("Cannot set up logging: {e}");
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "Configuration rejected");
            return ExitCode::from(1);
        }
    };
    tracing::debug!(version = config::APP_VERSION, "{} starting", config::APP_NAME);

    match dispatch(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from(1)
        }
    }
}

fn dispatch(cli: &Cli, config: &AppConfig) -> Result<(), AppError> {
    match &cli.command {
        Commands::Run => {
            let summary = run_pipeline(config)?;
            println!("{summary}");
            Ok(())
        }
        Commands::Init => init(config),
        Commands::Tree => {
            let tree = DirectoryTreeSnapshot::capture(&config.organised_directory)
                .map_err(|e| AppError::io("Cannot read organised directory", e))?;
            if tree.as_str().is_empty() {
                println!("(empty)");
            } else {
                println!("{}", tree.as_str());
            }
            Ok(())
        }
        Commands::Detect { file } => detect(config, file),
    }
}

// ── Component wiring ────────────────────────────────────────

fn build_backend(config: &AppConfig) -> Result<Arc<dyn ModelBackend + Send + Sync>, ModelError> {
    let m = &config.model;
    Ok(match m.provider {
        ModelProvider::Ollama => Arc::new(
            OllamaClient::new(&m.base_url, &m.text_model, &m.vision_model, m.timeout_secs)?
                .with_temperature(m.temperature),
        ),
        ModelProvider::Openai => Arc::new(
            OpenAiClient::from_env(
                &m.base_url,
                &m.api_key_env,
                &m.text_model,
                &m.vision_model,
                m.timeout_secs,
            )?
            .with_temperature(m.temperature),
        ),
    })
}

fn build_extractor(
    config: &AppConfig,
    backend: Arc<dyn ModelBackend + Send + Sync>,
) -> ExtractionChain {
    let chain = ExtractionChain::new(
        Box::new(VisionTranscriber::new(backend)),
        build_ocr_engine(&config.ocr),
        Box::new(PdfTextLayer),
        ImageDownscaler::new(config.image_size_limit_bytes()),
        ExtractionSettings {
            min_text_chars: config.min_text_chars,
            document_languages: config.document_languages.clone(),
            render_dpi: config.render_dpi,
        },
    );
    match PdfiumRenderer::new() {
        Ok(renderer) => chain.with_pdf_renderer(Box::new(renderer)),
        Err(e) => {
            tracing::warn!(error = %e, "PDFium not available, scanned PDFs cannot be read page by page");
            chain
        }
    }
}

fn build_vector_client(config: &AppConfig) -> Result<WeaviateClient, StorageError> {
    let v = &config.vector_store;
    WeaviateClient::new(
        &v.url,
        &v.embedding_model,
        &v.vectorizer_endpoint,
        v.timeout_secs,
    )
}

// ── Commands ────────────────────────────────────────────────

/// Walk the source directory once.
pub fn run_pipeline(config: &AppConfig) -> Result<RunSummary, AppError> {
    std::fs::create_dir_all(&config.organised_directory)
        .map_err(|e| AppError::io("Cannot create organised directory", e))?;

    let backend = build_backend(config)?;
    let extractor = build_extractor(config, backend.clone());
    let structurer =
        DocumentStructurer::new(backend).with_instructions(&config.organisation_instructions);

    let store = Arc::new(SqliteDocumentStore::open(&config.database_path)?);
    tracing::info!(documents = store.count()?, "Document database ready");

    let vectors = build_vector_client(config)?;
    if let Err(e) = vectors.ensure_collection(&config.vector_store.collection, EMBEDDING_SOURCE) {
        tracing::warn!(
            url = %vectors.base_url(),
            error = %e,
            "Vector collection check failed, vector writes will likely fail"
        );
    }

    let persistence = PersistenceCoordinator::new(
        store.clone(),
        Box::new(vectors),
        Box::new(FsMover),
        PersistSettings {
            organised_root: config.organised_directory.clone(),
            collection: config.vector_store.collection.clone(),
            timezone: config.timezone()?,
        },
    );
    let tree = DirectoryTreeSnapshot::capture(&config.organised_directory)
        .map_err(|e| AppError::io("Cannot read organised directory", e))?;

    let mut driver = PipelineDriver::new(
        Box::new(extractor),
        Box::new(structurer),
        Box::new(JsonFileRegistry::new(&config.registry_file)),
        persistence,
        tree,
        DriverSettings {
            source_root: config.source_directory.clone(),
            organised_root: config.organised_directory.clone(),
            extensions: config.extensions.clone(),
            excluded_directories: config.excluded_directories.clone(),
            hidden_marker: config.hidden_marker.clone(),
            user_language: config.user_language.clone(),
            context_length_tokens: config.context_length_tokens,
            chars_per_token: config.chars_per_token,
        },
    );

    let result = driver.run();
    drop(driver);
    close_store(store);
    result.map_err(AppError::from)
}

fn close_store(store: Arc<SqliteDocumentStore>) {
    match Arc::try_unwrap(store) {
        Ok(store) => {
            if let Err(e) = store.close() {
                tracing::error!(error = %e, "Closing the document database failed");
            }
        }
        Err(_) => tracing::warn!("Document database still shared, left open"),
    }
}

fn init(config: &AppConfig) -> Result<(), AppError> {
    let store = SqliteDocumentStore::open(&config.database_path)?;
    let count = store.count()?;
    store.close()?;
    println!(
        "Database {} ready ({count} documents)",
        config.database_path.display()
    );

    let vectors = build_vector_client(config)?;
    let created = vectors.ensure_collection(&config.vector_store.collection, EMBEDDING_SOURCE)?;
    println!(
        "Collection {} {}",
        config.vector_store.collection,
        if created { "created" } else { "already exists" }
    );
    Ok(())
}

fn detect(config: &AppConfig, file: &Path) -> Result<(), AppError> {
    let extractor = build_extractor(config, build_backend(config)?);
    let raw = extractor.extract(file)?;
    println!("languages: {}", raw.languages.join(", "));
    println!("characters: {}", raw.text.chars().count());
    println!("identity: {}", derive_identity(&raw.text));
    Ok(())
}
