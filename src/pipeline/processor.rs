//! Pipeline driver.
//!
//! Walks the source tree and takes every candidate file through
//! `Discovered → Extracted → Identified → Structured → Persisted → Relocated`.
//! Any stage can divert a file into `Error(kind)`; that skips the file and
//! the walk goes on. The only thing that stops the walk is a non-duplicate
//! relational failure.
//!
//! Files are processed one at a time. The driver owns the directory-tree
//! snapshot, hands it to the structurer by reference and re-renders it only
//! when a move created directories.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use super::extraction::{ExtractionError, TextExtractor};
use super::identity::derive_identity;
use super::registry::{CategoryRegistry, RegistryError};
use super::storage::{PersistError, PersistOutcome, PersistenceCoordinator};
use super::structuring::{Structurer, StructuringError};
use super::tree::DirectoryTreeSnapshot;

/// Why a file left the state machine early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Extraction,
    ContextBudget,
    Structuring,
    Duplicate,
    Persist,
    Relocation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::ContextBudget => "context_budget",
            Self::Structuring => "structuring",
            Self::Duplicate => "duplicate",
            Self::Persist => "persist",
            Self::Relocation => "relocation",
        }
    }
}

/// Per-file state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Discovered,
    Extracted,
    Identified,
    Structured,
    Persisted,
    Relocated,
    Error(ErrorKind),
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Estimated {estimated_tokens} tokens exceeds context of {limit}")]
    ContextBudget { estimated_tokens: usize, limit: usize },

    #[error("Category registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    #[error("Structuring failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Already stored as {identity}")]
    Duplicate { identity: Uuid },

    #[error("Persist failed: {0}")]
    Persist(#[from] PersistError),

    /// The record exists but the file could not be moved.
    #[error("Move to {destination} failed: {source}")]
    Relocation {
        destination: PathBuf,
        source: std::io::Error,
        vector_stored: bool,
        created_new_directories: bool,
    },
}

impl FileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::ContextBudget { .. } => ErrorKind::ContextBudget,
            Self::Registry(_) | Self::Structuring(_) => ErrorKind::Structuring,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Persist(_) => ErrorKind::Persist,
            Self::Relocation { .. } => ErrorKind::Relocation,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persist(e) if e.is_fatal())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source directory {0} does not exist")]
    MissingSource(PathBuf),

    /// The relational store may be inconsistent; the run was stopped.
    #[error("Fatal error on {path}: {source}")]
    Fatal {
        path: PathBuf,
        #[source]
        source: FileError,
    },
}

/// A file that made it all the way through.
#[derive(Debug, Clone)]
pub struct Processed {
    pub identity: Uuid,
    pub destination: PathBuf,
    pub vector_stored: bool,
    pub created_new_directories: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub relocated: usize,
    pub duplicates: usize,
    /// Vector writes that failed for files that were otherwise stored.
    pub vector_failures: usize,
    pub skipped: BTreeMap<ErrorKind, usize>,
    pub tree_refreshes: usize,
}

impl RunSummary {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, kind: ErrorKind) -> usize {
        self.skipped.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered {}, relocated {}, duplicates {}, skipped {}",
            self.discovered,
            self.relocated,
            self.duplicates,
            self.skipped_total()
        )?;
        if !self.skipped.is_empty() {
            let parts: Vec<String> = self
                .skipped
                .iter()
                .map(|(kind, n)| format!("{}={n}", kind.as_str()))
                .collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        if self.vector_failures > 0 {
            write!(f, ", vector store failures {}", self.vector_failures)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub source_root: PathBuf,
    pub organised_root: PathBuf,
    /// Lower case with a leading dot.
    pub extensions: Vec<String>,
    /// Directory names never descended into, compared case-insensitively.
    pub excluded_directories: Vec<String>,
    /// Directories whose name starts with this are skipped.
    pub hidden_marker: String,
    pub user_language: String,
    pub context_length_tokens: usize,
    pub chars_per_token: usize,
}

pub struct PipelineDriver {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    structurer: Box<dyn Structurer + Send + Sync>,
    registry: Box<dyn CategoryRegistry + Send + Sync>,
    persistence: PersistenceCoordinator,
    tree: DirectoryTreeSnapshot,
    settings: DriverSettings,
}

impl PipelineDriver {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        structurer: Box<dyn Structurer + Send + Sync>,
        registry: Box<dyn CategoryRegistry + Send + Sync>,
        persistence: PersistenceCoordinator,
        tree: DirectoryTreeSnapshot,
        settings: DriverSettings,
    ) -> Self {
        Self {
            extractor,
            structurer,
            registry,
            persistence,
            tree,
            settings,
        }
    }

    pub fn tree(&self) -> &DirectoryTreeSnapshot {
        &self.tree
    }

    /// Candidate files under the source root, collected before any file
    /// is processed so moved files are never seen twice.
    pub fn discover(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let root = &self.settings.source_root;
        if !root.is_dir() {
            return Err(PipelineError::MissingSource(root.clone()));
        }
        let organised = self.settings.organised_root.canonicalize().ok();
        let excluded: Vec<String> = self
            .settings
            .excluded_directories
            .iter()
            .map(|d| d.to_lowercase())
            .collect();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !self.skip_directory(e, &excluded, organised.as_deref())
            });

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot read directory entry, skipping");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if self.settings.extensions.contains(&format!(".{}", ext.to_lowercase())) => {
                    candidates.push(path.to_path_buf());
                }
                Some(_) => {
                    tracing::debug!(path = %path.display(), "Unrecognized extension, skipping");
                }
                None => {
                    tracing::debug!(path = %path.display(), "No extension, skipping");
                }
            }
        }
        Ok(candidates)
    }

    fn skip_directory(&self, entry: &DirEntry, excluded: &[String], organised: Option<&Path>) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        let marker = &self.settings.hidden_marker;
        if !marker.is_empty() && name.starts_with(marker.as_str()) {
            return true;
        }
        if excluded.contains(&name.to_lowercase()) {
            return true;
        }
        match organised {
            Some(organised) => entry.path().canonicalize().ok().as_deref() == Some(organised),
            None => false,
        }
    }

    /// Process every discovered file.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let candidates = self.discover()?;
        let mut summary = RunSummary {
            discovered: candidates.len(),
            ..RunSummary::default()
        };
        tracing::info!(
            source = %self.settings.source_root.display(),
            files = candidates.len(),
            "Starting document run"
        );

        for path in &candidates {
            match self.process_file(path) {
                Ok(processed) => {
                    summary.relocated += 1;
                    if !processed.vector_stored {
                        summary.vector_failures += 1;
                    }
                    if processed.created_new_directories {
                        self.refresh_tree();
                        summary.tree_refreshes += 1;
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(
                        path = %path.display(),
                        kind = e.kind().as_str(),
                        error = %e,
                        "Fatal store error, stopping run"
                    );
                    return Err(PipelineError::Fatal {
                        path: path.clone(),
                        source: e,
                    });
                }
                Err(FileError::Duplicate { .. }) => summary.duplicates += 1,
                Err(e) => {
                    let kind = e.kind();
                    if let FileError::Relocation {
                        vector_stored,
                        created_new_directories,
                        ..
                    } = e
                    {
                        tracing::error!(path = %path.display(), kind = kind.as_str(), error = %e, "File skipped");
                        if !vector_stored {
                            summary.vector_failures += 1;
                        }
                        // The move may have failed after creating directories.
                        if created_new_directories {
                            self.refresh_tree();
                            summary.tree_refreshes += 1;
                        }
                    } else {
                        tracing::warn!(path = %path.display(), kind = kind.as_str(), error = %e, "File skipped");
                    }
                    *summary.skipped.entry(kind).or_insert(0) += 1;
                }
            }
        }

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            tree_version = self.tree.version(),
            "Run complete: {summary}"
        );
        Ok(summary)
    }

    fn refresh_tree(&mut self) {
        if let Err(e) = self.tree.refresh() {
            tracing::warn!(error = %e, "Directory tree refresh failed, keeping previous snapshot");
        }
    }

    fn transition(path: &Path, state: &mut FileState, next: FileState) {
        tracing::debug!(path = %path.display(), from = ?*state, to = ?next, "File state");
        *state = next;
    }

    /// Take one file through the state machine.
    pub fn process_file(&self, path: &Path) -> Result<Processed, FileError> {
        let mut state = FileState::Discovered;
        let result = self.advance(path, &mut state);
        if let Err(e) = &result {
            Self::transition(path, &mut state, FileState::Error(e.kind()));
        }
        result
    }

    fn advance(&self, path: &Path, state: &mut FileState) -> Result<Processed, FileError> {
        let raw = self.extractor.extract(path)?;
        Self::transition(path, state, FileState::Extracted);

        let identity = derive_identity(&raw.text);
        Self::transition(path, state, FileState::Identified);
        tracing::info!(
            path = %path.display(),
            identity = %identity,
            chars = raw.text.chars().count(),
            languages = ?raw.languages,
            "Document identified"
        );

        let estimated_tokens = raw
            .text
            .chars()
            .count()
            .div_ceil(self.settings.chars_per_token.max(1));
        if estimated_tokens > self.settings.context_length_tokens {
            return Err(FileError::ContextBudget {
                estimated_tokens,
                limit: self.settings.context_length_tokens,
            });
        }

        let categories = self.registry.list_categories()?;
        let structured = self.structurer.structure(
            &raw,
            &self.settings.user_language,
            &self.tree,
            &categories,
        )?;
        Self::transition(path, state, FileState::Structured);

        let report = match self.persistence.persist(&raw, &structured, identity, path)? {
            PersistOutcome::Persisted(report) => report,
            PersistOutcome::Duplicate { identity } => return Err(FileError::Duplicate { identity }),
        };
        Self::transition(path, state, FileState::Persisted);

        let vector_stored = report.vector_error.is_none();
        let created_new_directories = report.created_new_directories;
        let relocation = report.relocation.map_err(|source| FileError::Relocation {
            destination: report.destination,
            source,
            vector_stored,
            created_new_directories,
        })?;
        Self::transition(path, state, FileState::Relocated);

        Ok(Processed {
            identity,
            destination: relocation.destination,
            vector_stored,
            created_new_directories,
        })
    }
}
