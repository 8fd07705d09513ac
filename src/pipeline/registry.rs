//! Category registry.
//!
//! The registry biases classification toward known categories. They are owned
//! outside the pipeline: the core only reads them, once per structuring
//! call, so edits made while a run is in progress are picked up.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::dedup_labels;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Cannot read registry {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed registry {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub trait CategoryRegistry {
    fn list_categories(&self) -> Result<Vec<String>, RegistryError>;
}

/// On-disk layout. A bare array is read as a category list; other keys
/// in the object form are ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    Lists {
        #[serde(default)]
        categories: Vec<String>,
    },
    Categories(Vec<String>),
}

/// JSON file registry: `{"categories": [...]}` or a bare array.
/// A missing file is an empty registry.
pub struct JsonFileRegistry {
    path: PathBuf,
}

impl JsonFileRegistry {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn load(&self) -> Result<Vec<String>, RegistryError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No registry file, using empty registry");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let parsed: RegistryFile =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let (RegistryFile::Lists { categories } | RegistryFile::Categories(categories)) = parsed;
        Ok(dedup_labels(categories))
    }
}

impl CategoryRegistry for JsonFileRegistry {
    fn list_categories(&self) -> Result<Vec<String>, RegistryError> {
        self.load()
    }
}

/// Fixed in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    categories: Vec<String>,
}

impl StaticRegistry {
    pub fn new(categories: &[&str]) -> Self {
        Self {
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl CategoryRegistry for StaticRegistry {
    fn list_categories(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.categories.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_categories_ignoring_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"categories": ["Invoices", "Taxes", "Invoices", " "], "tags": ["bank"]}"#,
        )
        .unwrap();

        let registry = JsonFileRegistry::new(&path);
        assert_eq!(registry.list_categories().unwrap(), vec!["Invoices", "Taxes"]);
    }

    #[test]
    fn bare_array_is_category_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.json");
        std::fs::write(&path, r#"["Contracts", "Medical"]"#).unwrap();
        let registry = JsonFileRegistry::new(&path);
        assert_eq!(registry.list_categories().unwrap(), vec!["Contracts", "Medical"]);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JsonFileRegistry::new(&dir.path().join("absent.json"));
        assert!(registry.list_categories().unwrap().is_empty());
    }

    #[test]
    fn edits_are_seen_on_next_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, r#"{"categories": ["A"]}"#).unwrap();
        let registry = JsonFileRegistry::new(&path);
        assert_eq!(registry.list_categories().unwrap(), vec!["A"]);

        std::fs::write(&path, r#"{"categories": ["A", "B"]}"#).unwrap();
        assert_eq!(registry.list_categories().unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileRegistry::new(&path).list_categories().unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn static_registry_lists_given() {
        let registry = StaticRegistry::new(&["Invoices"]);
        assert_eq!(registry.list_categories().unwrap(), vec!["Invoices"]);
    }
}
