//! Relational store client handed to the persistence coordinator.
//!
//! One connection per run, guarded by a mutex so there is exactly one writer
//! at a time. Opened by the driver at run start and closed at run end.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use super::repository;
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::PersistedDocument;

/// Row id of a stored document, used as cross-store linkage.
pub type RowRef = i64;

/// Relational side of persistence.
pub trait DocumentStore {
    /// Insert keyed by identity. `DatabaseError::DuplicateIdentity` when the
    /// identity already exists.
    fn insert(&self, doc: &PersistedDocument) -> Result<RowRef, DatabaseError>;

    fn count(&self) -> Result<i64, DatabaseError>;
}

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = open_database(path)?;
        tracing::info!(path = %path.display(), "Opened document database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_memory_database()?),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), DatabaseError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| DatabaseError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| DatabaseError::Sqlite(e))
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn insert(&self, doc: &PersistedDocument) -> Result<RowRef, DatabaseError> {
        self.with_connection(|conn| repository::insert_document(conn, doc))
    }

    fn count(&self) -> Result<i64, DatabaseError> {
        self.with_connection(repository::count_documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use uuid::Uuid;

    fn make_doc() -> PersistedDocument {
        PersistedDocument {
            identity: Uuid::new_v4(),
            title: "Lease".into(),
            text: "Lease agreement for flat 3".into(),
            original_text: None,
            summary: "Lease".into(),
            category: "Housing".into(),
            tags: vec![],
            languages: vec!["en".into()],
            timestamp: DateTime::parse_from_rfc3339("2022-01-01T00:00:00+01:00").unwrap(),
            current_filepath: "/org/Housing/lease.pdf".into(),
            original_filepath: "/in/lease.pdf".into(),
        }
    }

    #[test]
    fn insert_returns_increasing_row_ids() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let first = store.insert(&make_doc()).unwrap();
        let second = store.insert(&make_doc()).unwrap();
        assert!(second > first);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn duplicate_surfaces_through_store() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let doc = make_doc();
        store.insert(&doc).unwrap();
        assert!(store.insert(&doc).unwrap_err().is_duplicate());
    }

    #[test]
    fn reopen_file_store_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.db");

        let store = SqliteDocumentStore::open(&path).unwrap();
        let doc = make_doc();
        store.insert(&doc).unwrap();
        store.close().unwrap();

        let store = SqliteDocumentStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.insert(&doc).unwrap_err().is_duplicate());
    }
}
