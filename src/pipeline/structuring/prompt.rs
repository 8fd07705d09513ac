//! Prompt templates and output schemas for the model calls.
//!
//! Both structuring templates share the same context block (languages,
//! categories, current directory tree, organisational rules); the
//! translation template additionally asks for the full text in the user's
//! language.

use serde_json::{json, Value};

/// Organisational rules every structuring call carries.
pub const ORGANISATION_RULES: &str = "\
- Organise folders by owner first (a company, or Personal), then by category.
- Pick one of the known categories when it fits. If none fits, propose a new one.
- Reuse existing directories when they fit. Creating new directories is allowed.
- When the document relates to a period or date other than its issue date \
(a March invoice issued in April, a tax return for last year), use the date it \
relates to for the timestamp, the tags and the directory name.";

/// Prompt for reading one image or rendered page.
pub const TRANSCRIPTION_PROMPT: &str = "\
Transcribe all text in this image exactly as written.
Do not summarise, shorten, translate or comment on it; keep the original line breaks.
Also list the ISO 639-1 codes of every language the text is written in, most prominent first.
Answer with JSON only.";

/// Everything a structuring prompt is parameterized with besides the text.
pub struct PromptContext<'a> {
    pub document_languages: &'a [String],
    pub user_language: &'a str,
    pub categories: &'a [String],
    /// Rendered directory tree of the organised root.
    pub directory_tree: &'a str,
    /// Site-specific rules appended to `ORGANISATION_RULES`.
    pub extra_instructions: &'a str,
}

/// English name for an ISO 639-1 code; unknown codes are echoed.
pub fn language_name(code: &str) -> &str {
    match code {
        "zh" => "Chinese",
        "es" => "Spanish",
        "en" => "English",
        "hi" => "Hindi",
        "ar" => "Arabic",
        "bn" => "Bengali",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ja" => "Japanese",
        "de" => "German",
        "fr" => "French",
        "it" => "Italian",
        "nl" => "Dutch",
        "bg" => "Bulgarian",
        "ro" => "Romanian",
        other => other,
    }
}

fn describe_languages(codes: &[String]) -> String {
    if codes.is_empty() {
        return "unknown".to_string();
    }
    codes
        .iter()
        .map(|c| format!("{} ({c})", language_name(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn context_block(ctx: &PromptContext<'_>) -> String {
    let categories = if ctx.categories.is_empty() {
        "(none yet)".to_string()
    } else {
        ctx.categories.join(", ")
    };
    let tree = if ctx.directory_tree.trim().is_empty() {
        "(empty)"
    } else {
        ctx.directory_tree
    };
    let mut rules = ORGANISATION_RULES.to_string();
    if !ctx.extra_instructions.trim().is_empty() {
        rules.push('\n');
        rules.push_str(ctx.extra_instructions.trim());
    }

    format!(
        "Known categories: {categories}

Current directory structure:
```
{tree}
```

# Organisation rules
{rules}"
    )
}

fn format_block(translated: bool, user_language: &str) -> String {
    let language = language_name(user_language);
    let translation = if translated {
        format!("\n- text_user_lang: the complete document text translated into {language}")
    } else {
        String::new()
    };
    format!(
        "# Response format
Answer with a single JSON object and nothing else:
- title: short descriptive title in {language}
- summary: two or three sentences in {language}
- category: one category name
- directory: relative path of the target directory, using '/' between levels
- new_filename: descriptive file name without extension
- tags: list of short tags in {language}
- timestamp: the date the document relates to, YYYY-MM-DD, or null when there is none{translation}"
    )
}

/// Prompt for a document already in the user's language.
pub fn build_same_language_prompt(text: &str, ctx: &PromptContext<'_>) -> String {
    format!(
        "Examine the following document carefully.
It is written in: {languages}. The user's language is {user}.
Summarise it, tag it, assign a category and place it in the directory structure.

{context}

# Document
```
{text}
```

{format}",
        languages = describe_languages(ctx.document_languages),
        user = language_name(ctx.user_language),
        context = context_block(ctx),
        format = format_block(false, ctx.user_language),
    )
}

/// Prompt for a document that must be translated into the user's language.
pub fn build_translation_prompt(text: &str, ctx: &PromptContext<'_>) -> String {
    let user = language_name(ctx.user_language);
    format!(
        "Examine the following document carefully.
It is written in: {languages}. The user's language is {user}.
Translate the full text into {user}, then summarise it and tag it in {user}, \
assign a category and place it in the directory structure.

{context}

# Document
```
{text}
```

{format}",
        languages = describe_languages(ctx.document_languages),
        context = context_block(ctx),
        format = format_block(true, ctx.user_language),
    )
}

/// JSON schema for the structuring output.
pub fn structuring_schema(translated: bool) -> Value {
    let mut properties = json!({
        "title": {"type": "string"},
        "summary": {"type": "string"},
        "category": {"type": "string"},
        "directory": {"type": "string"},
        "new_filename": {"type": "string"},
        "tags": {"type": "array", "items": {"type": "string"}},
        "timestamp": {"type": ["string", "null"]}
    });
    let mut required = vec![
        "title",
        "summary",
        "category",
        "directory",
        "new_filename",
        "tags",
        "timestamp",
    ];
    if translated {
        properties["text_user_lang"] = json!({"type": "string"});
        required.push("text_user_lang");
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// JSON schema for image transcription output.
pub fn transcription_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string"},
            "langs": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["text", "langs"],
    })
}
