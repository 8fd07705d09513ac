use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parser::extract_json_payload;
use super::types::ModelBackend;
use super::ModelError;

/// Ollama HTTP client for local LLM inference.
///
/// Uses `/api/chat` with `format` set to the output schema, so the model
/// is constrained to emit a matching JSON object.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    text_model: String,
    vision_model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        text_model: &str,
        vision_model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ModelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ModelError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
            text_model: text_model.to_string(),
            vision_model: vision_model.to_string(),
            temperature: 0.0,
        })
    }

    /// Default Ollama instance at localhost:11434 with 5-minute timeout.
    pub fn default_local(text_model: &str, vision_model: &str) -> Result<Self, ModelError> {
        Self::new("http://localhost:11434", text_model, vision_model, 300)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat(
        &self,
        model: &str,
        prompt: &str,
        images: Option<Vec<String>>,
        output_schema: &Value,
    ) -> Result<Value, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images,
            }],
            stream: false,
            format: output_schema,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ModelError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ModelError::Timeout(self.timeout_secs)
                } else {
                    ModelError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ModelError::ResponseParsing(e.to_string()))?;

        tracing::debug!(
            model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_chars = parsed.message.content.len(),
            "Ollama chat completed"
        );

        extract_json_payload(&parsed.message.content)
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a Value,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    /// Base64-encoded images.
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ModelBackend for OllamaClient {
    fn complete_text(&self, prompt: &str, output_schema: &Value) -> Result<Value, ModelError> {
        self.chat(&self.text_model, prompt, None, output_schema)
    }

    fn complete_vision(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        output_schema: &Value,
    ) -> Result<Value, ModelError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        self.chat(&self.vision_model, prompt, Some(vec![encoded]), output_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "m", "v", 10).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn default_local_points_at_localhost() {
        let client = OllamaClient::default_local("m", "v").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.timeout_secs, 300);
    }

    #[test]
    fn request_serializes_schema_and_images() {
        let schema = json!({"type": "object"});
        let body = ChatRequest {
            model: "llava",
            messages: vec![ChatMessage {
                role: "user",
                content: "read this",
                images: Some(vec!["aGk=".into()]),
            }],
            stream: false,
            format: &schema,
            options: ChatOptions { temperature: 0.0 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], schema);
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["images"][0], "aGk=");
    }

    #[test]
    fn text_request_omits_images() {
        let schema = json!({});
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "x",
                images: None,
            }],
            stream: false,
            format: &schema,
            options: ChatOptions { temperature: 0.0 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value["messages"][0].get("images").is_none());
    }

    #[test]
    fn unreachable_server_is_connection_error() {
        // Port 9 (discard) is closed on test machines.
        let client = OllamaClient::new("http://127.0.0.1:9", "m", "v", 5).unwrap();
        let err = client.complete_text("hi", &json!({})).unwrap_err();
        assert!(
            matches!(err, ModelError::Connection(_) | ModelError::HttpClient(_)),
            "got {err}"
        );
    }
}
