use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text and detected languages for one source file, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub text: String,
    /// ISO 639-1 codes, most prominent first, no repeats. May be empty.
    pub languages: Vec<String>,
    pub source_path: PathBuf,
}

impl RawDocument {
    /// True when the document is entirely in `language`.
    pub fn is_entirely_in(&self, language: &str) -> bool {
        self.languages.len() == 1 && self.languages[0] == language
    }
}

/// A document date as proposed by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentTimestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl DocumentTimestamp {
    /// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
    /// (optionally fractional) and bare dates. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self::Zoned(zoned));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(Self::Naive(naive));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Self::Naive)
    }

    /// Naive values are read as wall-clock time in `zone`.
    pub fn localize(self, zone: FixedOffset) -> DateTime<FixedOffset> {
        match self {
            Self::Zoned(dt) => dt,
            Self::Naive(naive) => zone
                .from_local_datetime(&naive)
                .earliest()
                .unwrap_or_else(|| naive.and_utc().with_timezone(&zone)),
        }
    }
}

/// Classification fields shared by both structured variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub title: String,
    pub summary: String,
    pub category: String,
    /// Unique, first-seen order.
    pub tags: Vec<String>,
    /// Relative to the organised root.
    pub target_directory: String,
    /// Without extension; the source extension is kept on move.
    pub target_filename: String,
    pub timestamp: Option<DocumentTimestamp>,
}

/// Model output for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredDocument {
    /// Document already in the user's language.
    SameLanguage(Classification),
    /// Document translated into the user's language.
    CrossLanguage {
        classification: Classification,
        translated_text: String,
    },
}

impl StructuredDocument {
    pub fn classification(&self) -> &Classification {
        match self {
            Self::SameLanguage(c) => c,
            Self::CrossLanguage { classification, .. } => classification,
        }
    }

    pub fn translated_text(&self) -> Option<&str> {
        match self {
            Self::SameLanguage(_) => None,
            Self::CrossLanguage {
                translated_text, ..
            } => Some(translated_text),
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, Self::CrossLanguage { .. })
    }
}

/// Canonical record written to both stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDocument {
    pub identity: Uuid,
    pub title: String,
    /// Text in the user's language. Never empty.
    pub text: String,
    /// Raw extracted text, present only when a translation happened.
    pub original_text: Option<String>,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub languages: Vec<String>,
    pub timestamp: DateTime<FixedOffset>,
    pub current_filepath: String,
    pub original_filepath: String,
}

/// Remove blanks and repeats, keeping first-seen order.
pub fn dedup_labels<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if !label.is_empty() && !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}
