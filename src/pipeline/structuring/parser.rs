use serde::Deserialize;
use serde_json::Value;

use super::{ModelError, StructuringError};
use crate::models::{dedup_labels, Classification, DocumentTimestamp, StructuredDocument};

/// Pull the JSON value out of a completion.
///
/// Schema-constrained backends return a bare object, but some models still
/// wrap it in a ```json fence or add a sentence around it.
pub fn extract_json_payload(content: &str) -> Result<Value, ModelError> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(start) = trimmed.find("```json") {
        let body_start = start + 7;
        let body_end = trimmed[body_start..]
            .find("```")
            .ok_or_else(|| ModelError::MalformedOutput("Unclosed JSON block".into()))?;
        let body = trimmed[body_start..body_start + body_end].trim();
        return serde_json::from_str(body).map_err(|e| ModelError::MalformedOutput(e.to_string()));
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if close > open => {
            serde_json::from_str(&trimmed[open..=close])
                .map_err(|e| ModelError::MalformedOutput(e.to_string()))
        }
        _ => Err(ModelError::MalformedOutput(format!(
            "No JSON object in completion ({} chars)",
            trimmed.len()
        ))),
    }
}

/// Raw shape of both structuring templates' output.
#[derive(Debug, Deserialize)]
struct StructuringResponse {
    title: String,
    #[serde(default)]
    summary: String,
    category: String,
    #[serde(default)]
    directory: String,
    #[serde(default)]
    new_filename: String,
    #[serde(default)]
    tags: Value,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    text_user_lang: Option<String>,
}

/// Convert the model's JSON into the structured variant that was asked for.
pub fn parse_structured(value: Value, translated: bool) -> Result<StructuredDocument, StructuringError> {
    let raw: StructuringResponse = serde_json::from_value(value)
        .map_err(|e| StructuringError::SchemaMismatch(e.to_string()))?;

    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return Err(StructuringError::EmptyField("title"));
    }
    let category = raw.category.trim().to_string();
    if category.is_empty() {
        return Err(StructuringError::EmptyField("category"));
    }

    let classification = Classification {
        title,
        summary: raw.summary.trim().to_string(),
        category,
        tags: tags_from_value(&raw.tags),
        target_directory: raw.directory.trim().to_string(),
        target_filename: raw.new_filename.trim().to_string(),
        timestamp: raw.timestamp.as_deref().and_then(DocumentTimestamp::parse),
    };

    if !translated {
        return Ok(StructuredDocument::SameLanguage(classification));
    }

    match raw.text_user_lang {
        Some(text) if !text.trim().is_empty() => Ok(StructuredDocument::CrossLanguage {
            classification,
            translated_text: text,
        }),
        _ => Err(StructuringError::MissingTranslation),
    }
}

/// Tags arrive as an array, or occasionally as one comma-separated string.
fn tags_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => dedup_labels(items.iter().filter_map(Value::as_str)),
        Value::String(joined) => dedup_labels(joined.split(',')),
        _ => Vec::new(),
    }
}
