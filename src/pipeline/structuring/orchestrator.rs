use std::sync::Arc;
use std::time::Instant;

use super::parser::parse_structured;
use super::prompt::{
    build_same_language_prompt, build_translation_prompt, structuring_schema, PromptContext,
};
use super::types::ModelBackend;
use super::StructuringError;
use crate::models::{RawDocument, StructuredDocument};
use crate::pipeline::tree::DirectoryTreeSnapshot;

/// Classifies a raw document, translating it when needed.
pub trait Structurer {
    fn structure(
        &self,
        raw: &RawDocument,
        user_language: &str,
        directory_tree: &DirectoryTreeSnapshot,
        categories: &[String],
    ) -> Result<StructuredDocument, StructuringError>;
}

/// Model-backed structurer.
///
/// Picks the same-language template when the document is entirely in the
/// user's language and the translation template otherwise. The tree
/// snapshot is always the caller's current one.
pub struct DocumentStructurer {
    backend: Arc<dyn ModelBackend + Send + Sync>,
    extra_instructions: String,
}

impl DocumentStructurer {
    pub fn new(backend: Arc<dyn ModelBackend + Send + Sync>) -> Self {
        Self {
            backend,
            extra_instructions: String::new(),
        }
    }

    /// Site-specific organisational rules (owner entities, naming habits).
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.extra_instructions = instructions.to_string();
        self
    }
}

impl Structurer for DocumentStructurer {
    fn structure(
        &self,
        raw: &RawDocument,
        user_language: &str,
        directory_tree: &DirectoryTreeSnapshot,
        categories: &[String],
    ) -> Result<StructuredDocument, StructuringError> {
        let translate = !raw.is_entirely_in(user_language);
        let ctx = PromptContext {
            document_languages: &raw.languages,
            user_language,
            categories,
            directory_tree: directory_tree.as_str(),
            extra_instructions: &self.extra_instructions,
        };
        let prompt = if translate {
            build_translation_prompt(&raw.text, &ctx)
        } else {
            build_same_language_prompt(&raw.text, &ctx)
        };

        tracing::info!(
            path = %raw.source_path.display(),
            languages = ?raw.languages,
            translate,
            tree_version = directory_tree.version(),
            "Structuring document"
        );

        let started = Instant::now();
        let value = self
            .backend
            .complete_text(&prompt, &structuring_schema(translate))?;
        let structured = parse_structured(value, translate)?;

        tracing::info!(
            path = %raw.source_path.display(),
            category = %structured.classification().category,
            directory = %structured.classification().target_directory,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Structuring complete"
        );

        Ok(structured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::types::MockModelBackend;
    use serde_json::json;
    use std::path::PathBuf;

    fn raw(text: &str, langs: &[&str]) -> RawDocument {
        RawDocument {
            text: text.to_string(),
            languages: langs.iter().map(|s| s.to_string()).collect(),
            source_path: PathBuf::from("/in/doc.pdf"),
        }
    }

    fn response(extra: Option<&str>) -> serde_json::Value {
        let mut value = json!({
            "title": "Invoice",
            "summary": "An invoice.",
            "category": "Invoices",
            "directory": "Personal/Invoices",
            "new_filename": "invoice",
            "tags": ["invoice"],
            "timestamp": null
        });
        if let Some(text) = extra {
            value["text_user_lang"] = json!(text);
        }
        value
    }

    #[test]
    fn same_language_uses_plain_template() {
        let mock = Arc::new(MockModelBackend::new().with_text(response(None)));
        let structurer = DocumentStructurer::new(mock.clone());
        let tree = DirectoryTreeSnapshot::from_rendered("└── Personal");

        let doc = structurer
            .structure(&raw("Invoice 114", &["en"]), "en", &tree, &["Invoices".into()])
            .unwrap();

        assert!(matches!(doc, StructuredDocument::SameLanguage(_)));
        let prompts = mock.text_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains("text_user_lang"));
        assert!(prompts[0].contains("└── Personal"));
        assert!(prompts[0].contains("Invoices"));
    }

    #[test]
    fn foreign_document_is_translated() {
        let mock = Arc::new(
            MockModelBackend::new().with_text(response(Some("Invoice number 114, 120 EUR"))),
        );
        let structurer = DocumentStructurer::new(mock.clone());
        let tree = DirectoryTreeSnapshot::from_rendered("");

        let doc = structurer
            .structure(&raw("Rechnung 114", &["de"]), "en", &tree, &[])
            .unwrap();

        assert_eq!(doc.translated_text(), Some("Invoice number 114, 120 EUR"));
        assert!(mock.text_prompts()[0].contains("text_user_lang"));
    }

    #[test]
    fn mixed_languages_are_translated() {
        let mock = Arc::new(MockModelBackend::new().with_text(response(Some("full text"))));
        let structurer = DocumentStructurer::new(mock);
        let doc = structurer
            .structure(
                &raw("Invoice / Rechnung", &["en", "de"]),
                "en",
                &DirectoryTreeSnapshot::from_rendered(""),
                &[],
            )
            .unwrap();
        assert!(doc.is_translated());
    }

    #[test]
    fn model_failure_is_error() {
        let mock = Arc::new(MockModelBackend::new().with_text_error("connection reset"));
        let structurer = DocumentStructurer::new(mock);
        let result = structurer.structure(
            &raw("Invoice", &["en"]),
            "en",
            &DirectoryTreeSnapshot::from_rendered(""),
            &[],
        );
        assert!(matches!(result, Err(StructuringError::Model(_))));
    }

    #[test]
    fn instructions_reach_prompt() {
        let mock = Arc::new(MockModelBackend::new().with_text(response(None)));
        let structurer =
            DocumentStructurer::new(mock.clone()).with_instructions("Owners: Acme Ltd.");
        structurer
            .structure(
                &raw("Invoice", &["en"]),
                "en",
                &DirectoryTreeSnapshot::from_rendered(""),
                &[],
            )
            .unwrap();
        assert!(mock.text_prompts()[0].contains("Owners: Acme Ltd."));
    }
}
