//! Weaviate REST client.
//!
//! Objects are written through `/v1/batch/objects` with the document
//! identity as object id, so repeating a write replaces the object instead
//! of adding a second one. Vectorization happens server side through the
//! `text2vec-ollama` module; only the embedding source property is
//! vectorized.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::types::VectorStore;
use super::StorageError;

/// Properties declared on a new collection, with their Weaviate types.
const DOCUMENT_PROPERTIES: &[(&str, &str)] = &[
    ("title", "text"),
    ("text", "text"),
    ("original_text", "text"),
    ("summary", "text"),
    ("category", "text"),
    ("tags", "text[]"),
    ("languages", "text[]"),
    ("timestamp", "date"),
    ("current_filepath", "text"),
    ("original_filepath", "text"),
    ("db_id", "int"),
];

pub struct WeaviateClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    embedding_model: String,
    vectorizer_endpoint: String,
}

impl WeaviateClient {
    pub fn new(
        base_url: &str,
        embedding_model: &str,
        vectorizer_endpoint: &str,
        timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StorageError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
            embedding_model: embedding_model.to_string(),
            vectorizer_endpoint: vectorizer_endpoint.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create `collection` unless it already exists. Returns true if created.
    pub fn ensure_collection(
        &self,
        collection: &str,
        embedding_source: &str,
    ) -> Result<bool, StorageError> {
        let url = format!("{}/v1/schema/{collection}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| StorageError::from_reqwest(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(collection, "Vector collection exists");
            return Ok(false);
        }
        if status != reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::Api {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let definition = collection_definition(
            collection,
            embedding_source,
            &self.embedding_model,
            &self.vectorizer_endpoint,
        );
        let response = self
            .client
            .post(format!("{}/v1/schema", self.base_url))
            .json(&definition)
            .send()
            .map_err(|e| StorageError::from_reqwest(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        tracing::info!(
            collection,
            embedding_model = %self.embedding_model,
            "Created vector collection"
        );
        Ok(true)
    }
}

/// Class definition vectorizing only `embedding_source`.
fn collection_definition(
    collection: &str,
    embedding_source: &str,
    embedding_model: &str,
    vectorizer_endpoint: &str,
) -> Value {
    let properties: Vec<Value> = DOCUMENT_PROPERTIES
        .iter()
        .map(|(name, data_type)| {
            json!({
                "name": name,
                "dataType": [data_type],
                "moduleConfig": {
                    "text2vec-ollama": {
                        "skip": *name != embedding_source,
                        "vectorizePropertyName": false
                    }
                }
            })
        })
        .collect();

    json!({
        "class": collection,
        "vectorizer": "text2vec-ollama",
        "moduleConfig": {
            "text2vec-ollama": {
                "apiEndpoint": vectorizer_endpoint,
                "model": embedding_model,
                "vectorizeClassName": false
            }
        },
        "properties": properties
    })
}

#[derive(Deserialize)]
struct BatchObjectResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<BatchResultBody>,
}

#[derive(Deserialize)]
struct BatchResultBody {
    #[serde(default)]
    errors: Option<BatchErrors>,
}

#[derive(Deserialize)]
struct BatchErrors {
    #[serde(default)]
    error: Vec<BatchErrorMessage>,
}

#[derive(Deserialize)]
struct BatchErrorMessage {
    message: String,
}

/// First per-object error reported by a batch response, if any.
fn first_batch_error(results: Vec<BatchObjectResult>) -> Option<(String, String)> {
    results.into_iter().find_map(|r| {
        let message = r
            .result
            .and_then(|b| b.errors)
            .and_then(|e| e.error.into_iter().next())?
            .message;
        Some((r.id.unwrap_or_default(), message))
    })
}

impl VectorStore for WeaviateClient {
    fn upsert(
        &self,
        collection: &str,
        identity: &Uuid,
        properties: &Value,
        embedding_source: &str,
    ) -> Result<(), StorageError> {
        if properties.get(embedding_source).is_none() {
            return Err(StorageError::VectorDb(format!(
                "Embedding source property '{embedding_source}' missing"
            )));
        }

        let body = json!({
            "objects": [{
                "class": collection,
                "id": identity.to_string(),
                "properties": properties
            }]
        });

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/v1/batch/objects", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| StorageError::from_reqwest(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let results: Vec<BatchObjectResult> = response
            .json()
            .map_err(|e| StorageError::ResponseParsing(e.to_string()))?;
        if let Some((id, reason)) = first_batch_error(results) {
            return Err(StorageError::ObjectRejected { id, reason });
        }

        tracing::debug!(
            collection,
            identity = %identity,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Vector object upserted"
        );
        Ok(())
    }
}
