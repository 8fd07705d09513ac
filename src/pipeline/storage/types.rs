use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use uuid::Uuid;

use super::StorageError;
use crate::db::RowRef;

/// Semantic store side of persistence.
pub trait VectorStore {
    /// Create or replace the object keyed by `identity`. `embedding_source`
    /// names the property the store vectorizes.
    fn upsert(
        &self,
        collection: &str,
        identity: &Uuid,
        properties: &Value,
        embedding_source: &str,
    ) -> Result<(), StorageError>;
}

/// Filesystem move into the organised tree.
pub trait FileMover {
    /// Move `source` to `dest_dir/dest_name`, creating directories as needed.
    /// Returns true when at least one directory had to be created.
    fn move_file(&self, source: &Path, dest_dir: &Path, dest_name: &str) -> io::Result<bool>;
}

/// Where a relocated file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub destination: PathBuf,
    pub created_new_directories: bool,
}

/// A persisted document and what happened after the relational write.
#[derive(Debug)]
pub struct PersistReport {
    pub row_id: RowRef,
    pub identity: Uuid,
    pub destination: PathBuf,
    /// Reported, not compensated: the relational row stays either way.
    pub vector_error: Option<StorageError>,
    pub relocation: Result<Relocation, io::Error>,
    /// The destination directory was absent before the move and exists now.
    /// Also set when the move created it and then failed.
    pub created_new_directories: bool,
}

#[derive(Debug)]
pub enum PersistOutcome {
    Persisted(PersistReport),
    /// Identity already stored. Nothing was written and the file stays.
    Duplicate { identity: Uuid },
}
