//! Data models for lexnote
//!
//! Defines the persisted entities (documents, words, dictionary cache
//! entries, per-word overrides, per-document stats) and the merged
//! `WordView` the lookup cache hands to callers.
//!
//! Timestamps are stored as epoch milliseconds and exposed as
//! `DateTime<Utc>`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Default title for a freshly created document
pub const DEFAULT_TITLE: &str = "Untitled";

/// Convert a stored epoch-millisecond timestamp to a `DateTime`
pub fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// A note/article document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier
    pub id: i64,
    /// Display title
    pub title: String,
    /// Serialized content tree (JSON)
    pub content_json: String,
    /// When this document was created
    pub created_at: DateTime<Utc>,
    /// When this document was last updated
    pub updated_at: DateTime<Utc>,
}

/// A word the user marked as vocabulary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Word {
    /// Unique identifier, referenced by the inline mark in the document
    pub id: i64,
    /// Original surface text, case preserved
    pub headword: String,
    /// Normalized join key (lowercase, boundary punctuation stripped)
    pub headword_norm: String,
    /// Owning document
    pub document_id: i64,
    /// When this word was added
    pub created_at: DateTime<Utc>,
}

/// A cached dictionary record, shared across all words with the same
/// normalized headword
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DictionaryEntry {
    /// Normalized headword (unique)
    pub headword_norm: String,
    /// Phonetic transcription
    pub phonetic: Option<String>,
    /// Pronunciation audio URL
    pub audio_url: Option<String>,
    /// Part of speech of the primary meaning
    pub part_of_speech: Option<String>,
    /// Primary definition
    pub definition: Option<String>,
    /// Up to 12 synonyms
    pub synonyms: Vec<String>,
    /// When this record was fetched
    pub fetched_at: DateTime<Utc>,
}

/// User-supplied data layered on top of the dictionary record for one word
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordOverride {
    /// Owning word
    pub word_id: i64,
    /// User's own definition
    pub custom_definition: Option<String>,
    /// User's own phonetic transcription
    pub custom_phonetic: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the override was last edited
    pub updated_at: DateTime<Utc>,
}

/// A patch applied to a word's override; `None` fields are left unchanged
/// on update and empty on insert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverridePatch {
    pub custom_definition: Option<String>,
    pub custom_phonetic: Option<String>,
    pub notes: Option<String>,
}

impl OverridePatch {
    /// Whether the patch carries no changes
    pub fn is_empty(&self) -> bool {
        self.custom_definition.is_none()
            && self.custom_phonetic.is_none()
            && self.notes.is_none()
    }
}

/// Derived per-document statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentStats {
    /// Owning document (primary key)
    pub document_id: i64,
    /// Preview excerpt of the content
    pub snippet: String,
    /// Total word count of the content
    pub word_count: i64,
    /// Number of vocabulary words in the document
    pub vocab_count: i64,
    /// When these stats were computed
    pub computed_at: DateTime<Utc>,
}

/// Everything known about a word: row data, cached dictionary fields, and
/// user overrides merged into one view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordView {
    pub word_id: i64,
    pub headword: String,
    pub headword_norm: String,
    pub created_at: DateTime<Utc>,
    /// True while the lookup is still resolving
    pub is_loading: bool,
    // Dictionary fields (all empty when no entry could be resolved)
    pub phonetic: Option<String>,
    pub audio_url: Option<String>,
    pub part_of_speech: Option<String>,
    pub definition: Option<String>,
    pub synonyms: Vec<String>,
    // Override fields
    pub custom_definition: Option<String>,
    pub custom_phonetic: Option<String>,
    pub notes: Option<String>,
}

impl WordView {
    /// Placeholder view published while a lookup is in flight
    pub fn loading(word: &Word) -> Self {
        Self {
            word_id: word.id,
            headword: word.headword.clone(),
            headword_norm: word.headword_norm.clone(),
            created_at: word.created_at,
            is_loading: true,
            phonetic: None,
            audio_url: None,
            part_of_speech: None,
            definition: None,
            synonyms: Vec::new(),
            custom_definition: None,
            custom_phonetic: None,
            notes: None,
        }
    }

    /// Assemble the resolved view from its three sources
    pub fn merged(
        word: &Word,
        entry: Option<&DictionaryEntry>,
        override_row: Option<&WordOverride>,
    ) -> Self {
        let mut view = Self::loading(word);
        view.is_loading = false;
        if let Some(entry) = entry {
            view.phonetic = entry.phonetic.clone();
            view.audio_url = entry.audio_url.clone();
            view.part_of_speech = entry.part_of_speech.clone();
            view.definition = entry.definition.clone();
            view.synonyms = entry.synonyms.clone();
        }
        if let Some(over) = override_row {
            view.custom_definition = over.custom_definition.clone();
            view.custom_phonetic = over.custom_phonetic.clone();
            view.notes = over.notes.clone();
        }
        view
    }
}
