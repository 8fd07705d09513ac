use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::relocate::{plan_destination, Destination};
use super::types::{FileMover, PersistOutcome, PersistReport, Relocation, VectorStore};
use super::PersistError;
use crate::db::DocumentStore;
use crate::models::{PersistedDocument, RawDocument, StructuredDocument};

/// Property the vector store embeds.
pub const EMBEDDING_SOURCE: &str = "text";

/// A translation must be longer than this to replace the document text.
pub const MIN_TRANSLATION_CHARS: usize = 10;

#[derive(Debug, Clone)]
pub struct PersistSettings {
    pub organised_root: PathBuf,
    pub collection: String,
    /// Zone for naive timestamps and file-time fallbacks.
    pub timezone: FixedOffset,
}

/// Sequences the relational write, the vector write and the move.
///
/// Each step runs only if the one before it succeeded. The relational
/// insert is the commit point: a duplicate there stops everything, any
/// other relational failure is fatal, and failures after it are reported
/// on the returned report without undoing the row.
pub struct PersistenceCoordinator {
    store: Arc<dyn DocumentStore + Send + Sync>,
    vectors: Box<dyn VectorStore + Send + Sync>,
    mover: Box<dyn FileMover + Send + Sync>,
    settings: PersistSettings,
}

impl PersistenceCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore + Send + Sync>,
        vectors: Box<dyn VectorStore + Send + Sync>,
        mover: Box<dyn FileMover + Send + Sync>,
        settings: PersistSettings,
    ) -> Self {
        Self {
            store,
            vectors,
            mover,
            settings,
        }
    }

    pub fn persist(
        &self,
        raw: &RawDocument,
        structured: &StructuredDocument,
        identity: Uuid,
        source_path: &Path,
    ) -> Result<PersistOutcome, PersistError> {
        let destination = plan_destination(
            &self.settings.organised_root,
            structured.classification(),
            source_path,
        )
        .map_err(PersistError::Destination)?;
        let doc = self.assemble(raw, structured, identity, source_path, &destination)?;

        // 1. Relational write.
        let row_id = match self.store.insert(&doc) {
            Ok(row_id) => row_id,
            Err(e) if e.is_duplicate() => {
                tracing::warn!(
                    path = %source_path.display(),
                    identity = %identity,
                    "Duplicate document, leaving file in place"
                );
                return Ok(PersistOutcome::Duplicate { identity });
            }
            Err(e) => return Err(PersistError::Relational(e)),
        };
        tracing::info!(identity = %identity, row_id, "Document row stored");

        // 2. Vector write, keyed by the same identity.
        let properties = vector_properties(&doc, row_id);
        let vector_error = match self.vectors.upsert(
            &self.settings.collection,
            &identity,
            &properties,
            EMBEDDING_SOURCE,
        ) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(
                    path = %source_path.display(),
                    identity = %identity,
                    error = %e,
                    "Vector store write failed, relational row kept"
                );
                Some(e)
            }
        };

        // 3. Move.
        let dir_existed = destination.dir.is_dir();
        let relocation = self
            .mover
            .move_file(source_path, &destination.dir, &destination.file_name)
            .map(|created_new_directories| Relocation {
                destination: destination.path(),
                created_new_directories,
            });
        if let Err(e) = &relocation {
            tracing::error!(
                path = %source_path.display(),
                destination = %destination.path().display(),
                error = %e,
                "Move failed, relational row kept"
            );
        }

        let created_new_directories = match &relocation {
            Ok(r) => r.created_new_directories,
            Err(_) => !dir_existed && destination.dir.is_dir(),
        };

        Ok(PersistOutcome::Persisted(PersistReport {
            row_id,
            identity,
            destination: destination.path(),
            vector_error,
            relocation,
            created_new_directories,
        }))
    }

    /// Build the canonical record for one document.
    pub fn assemble(
        &self,
        raw: &RawDocument,
        structured: &StructuredDocument,
        identity: Uuid,
        source_path: &Path,
        destination: &Destination,
    ) -> Result<PersistedDocument, PersistError> {
        let (text, original_text) = match structured.translated_text() {
            None => (raw.text.clone(), None),
            Some(translated) => {
                let chars = translated.trim().chars().count();
                if chars <= MIN_TRANSLATION_CHARS {
                    return Err(PersistError::TranslationTooShort {
                        chars,
                        min: MIN_TRANSLATION_CHARS + 1,
                    });
                }
                (translated.to_string(), Some(raw.text.clone()))
            }
        };

        let zone = self.settings.timezone;
        let classification = structured.classification();
        let timestamp = match classification.timestamp {
            Some(ts) => ts.localize(zone),
            None => file_time(source_path, zone),
        };

        let current = destination
            .path()
            .strip_prefix(&self.settings.organised_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| destination.path());

        Ok(PersistedDocument {
            identity,
            title: classification.title.clone(),
            text,
            original_text,
            summary: classification.summary.clone(),
            category: classification.category.clone(),
            tags: classification.tags.clone(),
            languages: raw.languages.clone(),
            timestamp,
            current_filepath: current.to_string_lossy().into_owned(),
            original_filepath: source_path.to_string_lossy().into_owned(),
        })
    }
}

/// Creation time of `path` (modification time where the platform has no
/// creation time), in `zone`. Falls back to now.
fn file_time(path: &Path, zone: FixedOffset) -> DateTime<FixedOffset> {
    let meta = std::fs::metadata(path);
    let time = meta
        .as_ref()
        .ok()
        .and_then(|m| m.created().or_else(|_| m.modified()).ok());
    match time {
        Some(t) => DateTime::<Utc>::from(t).with_timezone(&zone),
        None => {
            tracing::warn!(path = %path.display(), "No file time available, using now");
            Utc::now().with_timezone(&zone)
        }
    }
}

/// Vector-store properties: the record without its identity (that is the
/// object key), the row id as linkage and the title folded into the
/// embedded text.
fn vector_properties(doc: &PersistedDocument, row_id: i64) -> Value {
    let mut value = serde_json::to_value(doc).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.remove("identity");
        map.insert(
            EMBEDDING_SOURCE.to_string(),
            Value::String(format!("{}\n\n{}", doc.title, doc.text)),
        );
        map.insert("db_id".to_string(), Value::from(row_id));
    }
    value
}
