pub mod types;
pub mod vectordb;
pub mod weaviate;
pub mod relocate;
pub mod orchestrator;

pub use orchestrator::*;
pub use relocate::*;
pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;

/// Vector store failures. Never fatal to a run.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot reach vector store at {0}")]
    Connection(String),

    #[error("Vector store request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Vector store API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Vector store rejected object {id}: {reason}")]
    ObjectRejected { id: String, reason: String },

    #[error("Unexpected vector store response: {0}")]
    ResponseParsing(String),

    #[error("Vector DB error: {0}")]
    VectorDb(String),
}

impl StorageError {
    pub(crate) fn from_reqwest(e: reqwest::Error, url: &str, timeout_secs: u64) -> Self {
        if e.is_connect() {
            StorageError::Connection(url.to_string())
        } else if e.is_timeout() {
            StorageError::Timeout(timeout_secs)
        } else {
            StorageError::HttpClient(e.to_string())
        }
    }
}

/// Failures of the persistence step that stop a file before its
/// relational record exists, or stop the run.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The translation is too short to stand in for the document text.
    #[error("Translated text too short ({chars} chars, minimum {min})")]
    TranslationTooShort { chars: usize, min: usize },

    #[error("Cannot plan destination: {0}")]
    Destination(String),

    /// Non-duplicate relational failure. The store may be inconsistent.
    #[error("Relational store write failed: {0}")]
    Relational(#[source] DatabaseError),
}

impl PersistError {
    /// Fatal errors end the run instead of skipping the file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PersistError::Relational(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_relational_failures_are_fatal() {
        assert!(PersistError::Relational(DatabaseError::LockPoisoned).is_fatal());
        assert!(!PersistError::TranslationTooShort { chars: 3, min: 10 }.is_fatal());
        assert!(!PersistError::Destination("x".into()).is_fatal());
    }
}
