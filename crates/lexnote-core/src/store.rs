//! Data access layer
//!
//! Typed operations over the five entities, built on the storage client
//! bridge. Plain CRUD except for two disciplines: the cascading delete
//! for documents, and probe-then-insert-or-update upserts for overrides
//! and stats.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;

use crate::bridge::StorageClient;
use crate::content::{self, ContentNode};
use crate::engine::{Row, Value};
use crate::headword;
use crate::models::{
    datetime_from_millis, DictionaryEntry, Document, DocumentStats, OverridePatch, Word,
    WordOverride, DEFAULT_TITLE,
};

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Data access layer over the storage engine
#[derive(Clone)]
pub struct Store {
    client: Arc<StorageClient>,
}

impl Store {
    pub fn new(client: Arc<StorageClient>) -> Self {
        Self { client }
    }

    /// The underlying storage client
    pub fn client(&self) -> &Arc<StorageClient> {
        &self.client
    }

    // ==================== Documents ====================

    /// Create a document with the default empty content tree
    pub async fn create_document(&self, title: Option<&str>) -> Result<Document> {
        let now = now_millis();
        let title = title.unwrap_or(DEFAULT_TITLE);
        let content_json = serde_json::to_string(&content::empty_document())?;

        let outcome = self
            .client
            .execute(
                "INSERT INTO documents (title, content_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                vec![Value::from(title), Value::from(content_json), Value::from(now)],
            )
            .await
            .context("Failed to create document")?;

        self.get_document(outcome.last_insert_id)
            .await?
            .ok_or_else(|| anyhow!("document vanished right after insert"))
    }

    /// Get a document by id
    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let rows = self
            .client
            .query(
                "SELECT id, title, content_json, created_at, updated_at
                 FROM documents WHERE id = ?1",
                vec![Value::from(id)],
            )
            .await
            .context("Failed to get document")?;
        rows.first().map(document_from_row).transpose()
    }

    /// All documents, most recently updated first
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = self
            .client
            .query(
                "SELECT id, title, content_json, created_at, updated_at
                 FROM documents ORDER BY updated_at DESC",
                vec![],
            )
            .await
            .context("Failed to list documents")?;
        rows.iter().map(document_from_row).collect()
    }

    /// Documents joined with their stats, for dashboard listings
    pub async fn list_documents_with_stats(
        &self,
    ) -> Result<Vec<(Document, Option<DocumentStats>)>> {
        let rows = self
            .client
            .query(
                "SELECT d.id, d.title, d.content_json, d.created_at, d.updated_at,
                        s.snippet AS s_snippet, s.word_count AS s_word_count,
                        s.vocab_count AS s_vocab_count, s.computed_at AS s_computed_at
                 FROM documents d
                 LEFT JOIN document_stats s ON s.document_id = d.id
                 ORDER BY d.updated_at DESC",
                vec![],
            )
            .await
            .context("Failed to list documents with stats")?;

        rows.iter()
            .map(|row| {
                let doc = document_from_row(row)?;
                let stats = match row.value("s_computed_at") {
                    Some(Value::Integer(computed)) => Some(DocumentStats {
                        document_id: doc.id,
                        snippet: row.text("s_snippet")?,
                        word_count: row.i64("s_word_count")?,
                        vocab_count: row.i64("s_vocab_count")?,
                        computed_at: datetime_from_millis(*computed),
                    }),
                    _ => None,
                };
                Ok((doc, stats))
            })
            .collect()
    }

    /// Rename a document, stamping `updated_at`
    pub async fn rename_document(&self, id: i64, title: &str) -> Result<()> {
        self.client
            .execute(
                "UPDATE documents SET title = ?1, updated_at = ?2 WHERE id = ?3",
                vec![Value::from(title), Value::from(now_millis()), Value::from(id)],
            )
            .await
            .context("Failed to rename document")?;
        Ok(())
    }

    /// Save a document's content tree, stamping `updated_at`
    pub async fn save_content(&self, id: i64, content: &ContentNode) -> Result<()> {
        let content_json = serde_json::to_string(content)?;
        self.client
            .execute(
                "UPDATE documents SET content_json = ?1, updated_at = ?2 WHERE id = ?3",
                vec![
                    Value::from(content_json),
                    Value::from(now_millis()),
                    Value::from(id),
                ],
            )
            .await
            .context("Failed to save document content")?;
        Ok(())
    }

    /// Delete a document and everything hanging off it: the words it
    /// owns, those words' overrides, and its stats row
    pub async fn delete_document(&self, id: i64) -> Result<()> {
        self.client
            .execute(
                "DELETE FROM word_overrides WHERE word_id IN
                 (SELECT id FROM words WHERE document_id = ?1)",
                vec![Value::from(id)],
            )
            .await
            .context("Failed to delete word overrides")?;
        self.client
            .execute(
                "DELETE FROM words WHERE document_id = ?1",
                vec![Value::from(id)],
            )
            .await
            .context("Failed to delete words")?;
        self.client
            .execute(
                "DELETE FROM document_stats WHERE document_id = ?1",
                vec![Value::from(id)],
            )
            .await
            .context("Failed to delete document stats")?;
        self.client
            .execute("DELETE FROM documents WHERE id = ?1", vec![Value::from(id)])
            .await
            .context("Failed to delete document")?;
        Ok(())
    }

    // ==================== Words ====================

    /// Add a vocabulary word to a document.
    ///
    /// The candidate is validated (length, single token, non-empty
    /// normalized form) before any row is written; the new row's id is
    /// taken from the insert itself.
    pub async fn add_word(&self, document_id: i64, raw: &str) -> Result<Word> {
        let headword_norm = headword::validate(raw)?;
        let headword = raw.trim().to_string();
        let now = now_millis();

        let outcome = self
            .client
            .execute(
                "INSERT INTO words (headword, headword_norm, document_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                vec![
                    Value::from(headword.clone()),
                    Value::from(headword_norm.clone()),
                    Value::from(document_id),
                    Value::from(now),
                ],
            )
            .await
            .context("Failed to insert word")?;

        Ok(Word {
            id: outcome.last_insert_id,
            headword,
            headword_norm,
            document_id,
            created_at: datetime_from_millis(now),
        })
    }

    /// Get a word by id
    pub async fn get_word(&self, id: i64) -> Result<Option<Word>> {
        let rows = self
            .client
            .query(
                "SELECT id, headword, headword_norm, document_id, created_at
                 FROM words WHERE id = ?1",
                vec![Value::from(id)],
            )
            .await
            .context("Failed to get word")?;
        rows.first().map(word_from_row).transpose()
    }

    /// All words owned by a document, oldest first
    pub async fn words_for_document(&self, document_id: i64) -> Result<Vec<Word>> {
        let rows = self
            .client
            .query(
                "SELECT id, headword, headword_norm, document_id, created_at
                 FROM words WHERE document_id = ?1 ORDER BY id",
                vec![Value::from(document_id)],
            )
            .await
            .context("Failed to list words")?;
        rows.iter().map(word_from_row).collect()
    }

    /// Remove a word row and its override. The caller is responsible for
    /// stripping the inline mark from the content tree and re-saving.
    pub async fn delete_word(&self, id: i64) -> Result<()> {
        self.client
            .execute(
                "DELETE FROM word_overrides WHERE word_id = ?1",
                vec![Value::from(id)],
            )
            .await
            .context("Failed to delete word override")?;
        self.client
            .execute("DELETE FROM words WHERE id = ?1", vec![Value::from(id)])
            .await
            .context("Failed to delete word")?;
        Ok(())
    }

    /// Live count of a document's vocabulary words
    pub async fn vocab_count(&self, document_id: i64) -> Result<i64> {
        let rows = self
            .client
            .query(
                "SELECT COUNT(*) AS n FROM words WHERE document_id = ?1",
                vec![Value::from(document_id)],
            )
            .await
            .context("Failed to count words")?;
        rows.first()
            .map(|row| row.i64("n"))
            .unwrap_or(Ok(0))
    }

    // ==================== Dictionary entries ====================

    /// Get the cached dictionary entry for a normalized headword
    pub async fn dictionary_entry(&self, headword_norm: &str) -> Result<Option<DictionaryEntry>> {
        let rows = self
            .client
            .query(
                "SELECT headword_norm, phonetic, audio_url, part_of_speech,
                        definition, synonyms, fetched_at
                 FROM dictionary_entries WHERE headword_norm = ?1",
                vec![Value::from(headword_norm)],
            )
            .await
            .context("Failed to get dictionary entry")?;
        rows.first().map(entry_from_row).transpose()
    }

    /// Persist a fetched dictionary entry unless one already exists for
    /// its normalized headword: first writer wins, entries are never
    /// updated after creation.
    pub async fn insert_dictionary_entry(&self, entry: &DictionaryEntry) -> Result<()> {
        let synonyms = serde_json::to_string(&entry.synonyms)?;
        self.client
            .execute(
                "INSERT OR IGNORE INTO dictionary_entries
                 (headword_norm, phonetic, audio_url, part_of_speech,
                  definition, synonyms, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                vec![
                    Value::from(entry.headword_norm.clone()),
                    Value::from(entry.phonetic.clone()),
                    Value::from(entry.audio_url.clone()),
                    Value::from(entry.part_of_speech.clone()),
                    Value::from(entry.definition.clone()),
                    Value::from(synonyms),
                    Value::from(entry.fetched_at.timestamp_millis()),
                ],
            )
            .await
            .context("Failed to insert dictionary entry")?;
        Ok(())
    }

    // ==================== Word overrides ====================

    /// Get the override for a word, if any
    pub async fn override_for_word(&self, word_id: i64) -> Result<Option<WordOverride>> {
        let rows = self
            .client
            .query(
                "SELECT word_id, custom_definition, custom_phonetic, notes, updated_at
                 FROM word_overrides WHERE word_id = ?1",
                vec![Value::from(word_id)],
            )
            .await
            .context("Failed to get word override")?;
        rows.first().map(override_from_row).transpose()
    }

    /// Apply an override patch: update the existing row if one exists,
    /// insert a new one otherwise. Fields absent from the patch keep
    /// their stored values. Always stamps `updated_at`.
    pub async fn upsert_override(
        &self,
        word_id: i64,
        patch: &OverridePatch,
    ) -> Result<WordOverride> {
        let now = now_millis();
        let existing = self.override_for_word(word_id).await?;

        let merged = match &existing {
            Some(current) => WordOverride {
                word_id,
                custom_definition: patch
                    .custom_definition
                    .clone()
                    .or_else(|| current.custom_definition.clone()),
                custom_phonetic: patch
                    .custom_phonetic
                    .clone()
                    .or_else(|| current.custom_phonetic.clone()),
                notes: patch.notes.clone().or_else(|| current.notes.clone()),
                updated_at: datetime_from_millis(now),
            },
            None => WordOverride {
                word_id,
                custom_definition: patch.custom_definition.clone(),
                custom_phonetic: patch.custom_phonetic.clone(),
                notes: patch.notes.clone(),
                updated_at: datetime_from_millis(now),
            },
        };

        if existing.is_some() {
            self.client
                .execute(
                    "UPDATE word_overrides
                     SET custom_definition = ?1, custom_phonetic = ?2, notes = ?3, updated_at = ?4
                     WHERE word_id = ?5",
                    vec![
                        Value::from(merged.custom_definition.clone()),
                        Value::from(merged.custom_phonetic.clone()),
                        Value::from(merged.notes.clone()),
                        Value::from(now),
                        Value::from(word_id),
                    ],
                )
                .await
                .context("Failed to update word override")?;
        } else {
            self.client
                .execute(
                    "INSERT INTO word_overrides
                     (word_id, custom_definition, custom_phonetic, notes, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    vec![
                        Value::from(word_id),
                        Value::from(merged.custom_definition.clone()),
                        Value::from(merged.custom_phonetic.clone()),
                        Value::from(merged.notes.clone()),
                        Value::from(now),
                    ],
                )
                .await
                .context("Failed to insert word override")?;
        }

        Ok(merged)
    }

    // ==================== Document stats ====================

    /// Get the stats row for a document
    pub async fn stats_for_document(&self, document_id: i64) -> Result<Option<DocumentStats>> {
        let rows = self
            .client
            .query(
                "SELECT document_id, snippet, word_count, vocab_count, computed_at
                 FROM document_stats WHERE document_id = ?1",
                vec![Value::from(document_id)],
            )
            .await
            .context("Failed to get document stats")?;
        rows.first().map(stats_from_row).transpose()
    }

    /// Insert-or-replace the stats row for a document
    pub async fn upsert_stats(
        &self,
        document_id: i64,
        snippet: &str,
        word_count: i64,
        vocab_count: i64,
    ) -> Result<()> {
        self.client
            .execute(
                "INSERT OR REPLACE INTO document_stats
                 (document_id, snippet, word_count, vocab_count, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                vec![
                    Value::from(document_id),
                    Value::from(snippet),
                    Value::from(word_count),
                    Value::from(vocab_count),
                    Value::from(now_millis()),
                ],
            )
            .await
            .context("Failed to upsert document stats")?;
        Ok(())
    }
}

// ==================== Row conversion ====================

fn document_from_row(row: &Row) -> Result<Document> {
    Ok(Document {
        id: row.i64("id")?,
        title: row.text("title")?,
        content_json: row.text("content_json")?,
        created_at: datetime_from_millis(row.i64("created_at")?),
        updated_at: datetime_from_millis(row.i64("updated_at")?),
    })
}

fn word_from_row(row: &Row) -> Result<Word> {
    Ok(Word {
        id: row.i64("id")?,
        headword: row.text("headword")?,
        headword_norm: row.text("headword_norm")?,
        document_id: row.i64("document_id")?,
        created_at: datetime_from_millis(row.i64("created_at")?),
    })
}

fn entry_from_row(row: &Row) -> Result<DictionaryEntry> {
    let synonyms: Vec<String> = serde_json::from_str(&row.text("synonyms")?)
        .context("Malformed synonyms column")?;
    Ok(DictionaryEntry {
        headword_norm: row.text("headword_norm")?,
        phonetic: row.opt_text("phonetic")?,
        audio_url: row.opt_text("audio_url")?,
        part_of_speech: row.opt_text("part_of_speech")?,
        definition: row.opt_text("definition")?,
        synonyms,
        fetched_at: datetime_from_millis(row.i64("fetched_at")?),
    })
}

fn override_from_row(row: &Row) -> Result<WordOverride> {
    Ok(WordOverride {
        word_id: row.i64("word_id")?,
        custom_definition: row.opt_text("custom_definition")?,
        custom_phonetic: row.opt_text("custom_phonetic")?,
        notes: row.opt_text("notes")?,
        updated_at: datetime_from_millis(row.i64("updated_at")?),
    })
}

fn stats_from_row(row: &Row) -> Result<DocumentStats> {
    Ok(DocumentStats {
        document_id: row.i64("document_id")?,
        snippet: row.text("snippet")?,
        word_count: row.i64("word_count")?,
        vocab_count: row.i64("vocab_count")?,
        computed_at: datetime_from_millis(row.i64("computed_at")?),
    })
}
