pub mod types;
pub mod prompt;
pub mod parser;
pub mod ollama;
pub mod openai;
pub mod orchestrator;

pub use types::*;
pub use parser::*;
pub use ollama::*;
pub use openai::*;
pub use orchestrator::*;

use thiserror::Error;

/// Failures of the model backend itself (transport, protocol, output format).
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model backend is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Model backend returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    /// The completion was not the JSON value the schema asked for.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Structured output does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Structured output has empty {0}")]
    EmptyField(&'static str),

    #[error("Translation requested but missing from output")]
    MissingTranslation,
}
