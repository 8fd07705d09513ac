//! OpenAI-compatible chat-completions backend.
//!
//! Works against api.openai.com and any server exposing the same protocol.
//! The output schema goes in `response_format`; images travel as data URLs.

use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::parser::extract_json_payload;
use super::types::ModelBackend;
use super::ModelError;

pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    text_model: String,
    vision_model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
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
            api_key: api_key.to_string(),
            client,
            timeout_secs,
            text_model: text_model.to_string(),
            vision_model: vision_model.to_string(),
            temperature: 0.0,
        })
    }

    /// Read the API key from `key_env`.
    pub fn from_env(
        base_url: &str,
        key_env: &str,
        text_model: &str,
        vision_model: &str,
        timeout_secs: u64,
    ) -> Result<Self, ModelError> {
        let api_key = std::env::var(key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(key_env.to_string()))?;
        Self::new(base_url, &api_key, text_model, vision_model, timeout_secs)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn complete(&self, model: &str, content: Value, output_schema: &Value) -> Result<Value, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = build_request(model, content, output_schema, self.temperature);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| ModelError::ResponseParsing(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::ResponseParsing("completion has no content".into()))?;

        extract_json_payload(&content)
    }
}

fn build_request(model: &str, content: Value, output_schema: &Value, temperature: f32) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [{"role": "user", "content": content}],
        "response_format": {
            "type": "json_schema",
            "json_schema": {"name": "document", "schema": output_schema}
        }
    })
}

/// `data:` URL for an encoded image, sniffing the format from its header.
fn image_data_url(image_bytes: &[u8]) -> String {
    let mime = match image::guess_format(image_bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Tiff) => "image/tiff",
        _ => "image/jpeg",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
    format!("data:{mime};base64,{encoded}")
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl ModelBackend for OpenAiClient {
    fn complete_text(&self, prompt: &str, output_schema: &Value) -> Result<Value, ModelError> {
        self.complete(&self.text_model, json!(prompt), output_schema)
    }

    fn complete_vision(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        output_schema: &Value,
    ) -> Result<Value, ModelError> {
        let content = json!([
            {"type": "text", "text": prompt},
            {"type": "image_url", "image_url": {"url": image_data_url(image_bytes)}}
        ]);
        self.complete(&self.vision_model, content, output_schema)
    }
}
