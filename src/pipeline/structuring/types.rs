use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use super::ModelError;

/// Language model backend: text and vision completions constrained by a
/// JSON schema.
pub trait ModelBackend {
    fn complete_text(&self, prompt: &str, output_schema: &Value) -> Result<Value, ModelError>;

    fn complete_vision(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        output_schema: &Value,
    ) -> Result<Value, ModelError>;
}

type Scripted = Result<Value, String>;

/// Mock backend for testing. Replays scripted responses in order and
/// records what it was asked.
#[derive(Default)]
pub struct MockModelBackend {
    text_responses: Mutex<VecDeque<Scripted>>,
    vision_responses: Mutex<VecDeque<Scripted>>,
    text_prompts: Mutex<Vec<String>>,
    vision_prompts: Mutex<Vec<String>>,
}

impl MockModelBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, value: Value) -> Self {
        push(&self.text_responses, Ok(value));
        self
    }

    pub fn with_text_error(self, message: &str) -> Self {
        push(&self.text_responses, Err(message.to_string()));
        self
    }

    pub fn with_vision(self, value: Value) -> Self {
        push(&self.vision_responses, Ok(value));
        self
    }

    pub fn with_vision_error(self, message: &str) -> Self {
        push(&self.vision_responses, Err(message.to_string()));
        self
    }

    /// Queue another structuring response on an already shared mock.
    pub fn push_text(&self, value: Value) {
        push(&self.text_responses, Ok(value));
    }

    pub fn text_prompts(&self) -> Vec<String> {
        self.text_prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn text_calls(&self) -> usize {
        self.text_prompts().len()
    }

    pub fn vision_calls(&self) -> usize {
        self.vision_prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

fn push(queue: &Mutex<VecDeque<Scripted>>, item: Scripted) {
    if let Ok(mut q) = queue.lock() {
        q.push_back(item);
    }
}

fn next(queue: &Mutex<VecDeque<Scripted>>) -> Result<Value, ModelError> {
    let item = queue.lock().ok().and_then(|mut q| q.pop_front());
    match item {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(ModelError::HttpClient(message)),
        None => Err(ModelError::Connection("mock: no scripted response".into())),
    }
}

impl ModelBackend for MockModelBackend {
    fn complete_text(&self, prompt: &str, _output_schema: &Value) -> Result<Value, ModelError> {
        if let Ok(mut prompts) = self.text_prompts.lock() {
            prompts.push(prompt.to_string());
        }
        next(&self.text_responses)
    }

    fn complete_vision(
        &self,
        prompt: &str,
        _image_bytes: &[u8],
        _output_schema: &Value,
    ) -> Result<Value, ModelError> {
        if let Ok(mut prompts) = self.vision_prompts.lock() {
            prompts.push(prompt.to_string());
        }
        next(&self.vision_responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mock_replays_in_order() {
        let mock = MockModelBackend::new()
            .with_text(json!({"n": 1}))
            .with_text_error("boom")
            .with_text(json!({"n": 2}));

        assert_eq!(mock.complete_text("a", &json!({})).unwrap(), json!({"n": 1}));
        assert!(mock.complete_text("b", &json!({})).is_err());
        assert_eq!(mock.complete_text("c", &json!({})).unwrap(), json!({"n": 2}));
        assert!(mock.complete_text("d", &json!({})).is_err());
        assert_eq!(mock.text_prompts(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn vision_and_text_queues_are_separate() {
        let mock = MockModelBackend::new().with_vision(json!({"text": "x"}));
        assert!(mock.complete_text("t", &json!({})).is_err());
        assert!(mock.complete_vision("v", b"img", &json!({})).is_ok());
        assert_eq!(mock.vision_calls(), 1);
        assert_eq!(mock.text_calls(), 1);
    }
}
