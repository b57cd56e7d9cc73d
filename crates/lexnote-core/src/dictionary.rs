//! Dictionary lookups
//!
//! Resolves a vocabulary word to a [`WordView`] by layering, in order:
//! the shared persisted dictionary entry for its normalized headword, a
//! remote fetch when no entry exists yet, and the user's per-word
//! override. Resolved views are cached in memory for the lifetime of the
//! [`Dictionary`] instance.
//!
//! A missing headword (404 from the remote API) is a valid outcome: the
//! view carries no entry fields and no row is persisted, so a later
//! lookup asks the API again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::{DictionaryEntry, WordView};
use crate::store::Store;

/// Cap on synonyms kept per entry
const SYNONYM_CAP: usize = 12;

/// Where dictionary entries come from when none is persisted yet
#[async_trait]
pub trait DictionarySource: Send + Sync {
    /// Fetch the entry for a normalized headword.
    ///
    /// `Ok(None)` means the dictionary definitively has no such word;
    /// `Err` means the lookup could not be completed (network, decode).
    async fn fetch(&self, headword_norm: &str) -> Result<Option<DictionaryEntry>>;
}

/// Client for the free dictionaryapi.dev REST API
pub struct HttpDictionarySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDictionarySource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.dictionary_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DictionarySource for HttpDictionarySource {
    async fn fetch(&self, headword_norm: &str) -> Result<Option<DictionaryEntry>> {
        let url = format!("{}/{}", self.base_url, headword_norm);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!("dictionary API returned {}", response.status()));
        }

        let payload: Vec<ApiEntry> = response.json().await?;
        Ok(entry_from_payload(headword_norm, &payload))
    }
}

// ==================== API payload ====================

#[derive(Debug, Deserialize)]
struct ApiEntry {
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    phonetics: Vec<ApiPhonetic>,
    #[serde(default)]
    meanings: Vec<ApiMeaning>,
}

#[derive(Debug, Deserialize)]
struct ApiPhonetic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMeaning {
    #[serde(rename = "partOfSpeech", default)]
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<ApiDefinition>,
    #[serde(default)]
    synonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDefinition {
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
}

/// Distill the API's list-of-entries payload into one entry.
///
/// Phonetics prefer the variant that carries audio; part of speech and
/// definition come from the first meaning; synonyms are the union of
/// meaning- and definition-level lists, deduplicated and capped.
fn entry_from_payload(headword_norm: &str, payload: &[ApiEntry]) -> Option<DictionaryEntry> {
    let first = payload.first()?;

    let non_empty = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let with_audio = first
        .phonetics
        .iter()
        .find(|p| non_empty(&p.audio).is_some());
    let audio_url = with_audio.and_then(|p| non_empty(&p.audio));
    let phonetic = with_audio
        .and_then(|p| non_empty(&p.text))
        .or_else(|| non_empty(&first.phonetic))
        .or_else(|| first.phonetics.iter().find_map(|p| non_empty(&p.text)));

    let first_meaning = first.meanings.first();
    let part_of_speech = first_meaning.and_then(|m| non_empty(&m.part_of_speech));
    let definition = first_meaning
        .and_then(|m| m.definitions.iter().find_map(|d| non_empty(&d.definition)));

    let mut synonyms = Vec::new();
    for meaning in &first.meanings {
        let flat = meaning
            .synonyms
            .iter()
            .chain(meaning.definitions.iter().flat_map(|d| d.synonyms.iter()));
        for synonym in flat {
            let synonym = synonym.trim();
            if synonym.is_empty() || synonyms.iter().any(|s| s == synonym) {
                continue;
            }
            synonyms.push(synonym.to_string());
            if synonyms.len() == SYNONYM_CAP {
                break;
            }
        }
        if synonyms.len() == SYNONYM_CAP {
            break;
        }
    }

    Some(DictionaryEntry {
        headword_norm: headword_norm.to_string(),
        phonetic,
        audio_url,
        part_of_speech,
        definition,
        synonyms,
        fetched_at: Utc::now(),
    })
}

// ==================== Lookup cache ====================

enum CacheState {
    /// A lookup for this word is in flight
    Loading(WordView),
    Resolved(WordView),
}

/// Per-session dictionary lookup service
pub struct Dictionary {
    store: Store,
    source: Arc<dyn DictionarySource>,
    cache: Mutex<HashMap<i64, CacheState>>,
}

impl Dictionary {
    pub fn new(store: Store, config: &Config) -> Result<Self> {
        let source = Arc::new(HttpDictionarySource::new(config)?);
        Ok(Self::with_source(store, source))
    }

    pub fn with_source(store: Store, source: Arc<dyn DictionarySource>) -> Self {
        Self {
            store,
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the merged view for a word.
    ///
    /// Returns `None` when the word row does not exist (never cached).
    /// A concurrent lookup for the same word gets the placeholder view
    /// instead of a second fetch. Remote failures degrade to a view
    /// without entry fields, left uncached so a retry can fetch again.
    pub async fn lookup(&self, word_id: i64) -> Result<Option<WordView>> {
        let word = match self.store.get_word(word_id).await? {
            Some(word) => word,
            None => return Ok(None),
        };

        {
            let mut cache = self.cache.lock().await;
            match cache.get(&word_id) {
                Some(CacheState::Resolved(view)) | Some(CacheState::Loading(view)) => {
                    return Ok(Some(view.clone()));
                }
                None => {
                    cache.insert(word_id, CacheState::Loading(WordView::loading(&word)));
                }
            }
        }

        let entry = match self.resolve_entry(&word.headword_norm).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    headword = %word.headword_norm,
                    error = %err,
                    "Dictionary lookup failed, showing word without entry"
                );
                self.cache.lock().await.remove(&word_id);
                let over = self.store.override_for_word(word_id).await?;
                return Ok(Some(WordView::merged(&word, None, over.as_ref())));
            }
        };

        // Any failure past this point must also evict the placeholder,
        // or every later lookup would return it forever.
        let over = match self.store.override_for_word(word_id).await {
            Ok(over) => over,
            Err(err) => {
                self.cache.lock().await.remove(&word_id);
                return Err(err);
            }
        };
        let view = WordView::merged(&word, entry.as_ref(), over.as_ref());
        self.cache
            .lock()
            .await
            .insert(word_id, CacheState::Resolved(view.clone()));
        Ok(Some(view))
    }

    /// Apply an override patch to a word and return its refreshed view
    pub async fn update_override(
        &self,
        word_id: i64,
        patch: &crate::models::OverridePatch,
    ) -> Result<WordView> {
        self.store
            .get_word(word_id)
            .await?
            .ok_or_else(|| anyhow!("word {} not found", word_id))?;
        self.store.upsert_override(word_id, patch).await?;
        self.invalidate(word_id).await;
        self.lookup(word_id)
            .await?
            .ok_or_else(|| anyhow!("word {} not found", word_id))
    }

    /// Drop one word from the session cache
    pub async fn invalidate(&self, word_id: i64) {
        self.cache.lock().await.remove(&word_id);
    }

    /// Drop the whole session cache
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    /// Persisted entry if present, otherwise fetch and persist.
    ///
    /// The insert ignores conflicts and the entry is re-read afterwards,
    /// so when two sessions race the first writer's entry wins.
    async fn resolve_entry(&self, headword_norm: &str) -> Result<Option<DictionaryEntry>> {
        if let Some(entry) = self.store.dictionary_entry(headword_norm).await? {
            return Ok(Some(entry));
        }

        match self.source.fetch(headword_norm).await? {
            Some(entry) => {
                self.store.insert_dictionary_entry(&entry).await?;
                self.store.dictionary_entry(headword_norm).await
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::StorageClient;
    use crate::config::Config;
    use crate::models::OverridePatch;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that serves canned entries and counts fetches
    struct StubSource {
        entries: HashMap<String, DictionaryEntry>,
        fetches: AtomicUsize,
        fail: bool,
    }

    impl StubSource {
        fn with_entry(entry: DictionaryEntry) -> Self {
            let mut entries = HashMap::new();
            entries.insert(entry.headword_norm.clone(), entry);
            Self {
                entries,
                fetches: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn empty() -> Self {
            Self {
                entries: HashMap::new(),
                fetches: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                entries: HashMap::new(),
                fetches: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DictionarySource for StubSource {
        async fn fetch(&self, headword_norm: &str) -> Result<Option<DictionaryEntry>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.entries.get(headword_norm).cloned())
        }
    }

    fn sample_entry(headword_norm: &str) -> DictionaryEntry {
        DictionaryEntry {
            headword_norm: headword_norm.to_string(),
            phonetic: Some("/ˌsɛrənˈdɪpɪti/".to_string()),
            audio_url: Some("https://example.com/audio.mp3".to_string()),
            part_of_speech: Some("noun".to_string()),
            definition: Some("A fortunate discovery".to_string()),
            synonyms: vec!["luck".to_string()],
            fetched_at: Utc::now(),
        }
    }

    async fn test_setup(source: Arc<StubSource>) -> (Store, Dictionary, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let client = StorageClient::connect(Config::with_data_dir(dir.path()));
        client.initialize().await.unwrap();
        let store = Store::new(client);
        let dict = Dictionary::with_source(store.clone(), source);
        (store, dict, dir)
    }

    #[tokio::test]
    async fn lookup_fetches_once_then_serves_from_cache() {
        let source = Arc::new(StubSource::with_entry(sample_entry("serendipity")));
        let (store, dict, _dir) = test_setup(source.clone()).await;

        let doc = store.create_document(None).await.unwrap();
        let word = store.add_word(doc.id, "Serendipity").await.unwrap();

        let view = dict.lookup(word.id).await.unwrap().unwrap();
        assert_eq!(view.definition.as_deref(), Some("A fortunate discovery"));
        assert_eq!(view.part_of_speech.as_deref(), Some("noun"));
        assert!(!view.is_loading);

        let again = dict.lookup(word.id).await.unwrap().unwrap();
        assert_eq!(again, view);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn same_headword_in_two_documents_shares_one_entry() {
        let source = Arc::new(StubSource::with_entry(sample_entry("quick")));
        let (store, dict, _dir) = test_setup(source.clone()).await;

        let first = store.create_document(None).await.unwrap();
        let second = store.create_document(None).await.unwrap();
        let word_a = store.add_word(first.id, "quick").await.unwrap();
        let word_b = store.add_word(second.id, "Quick!").await.unwrap();

        dict.lookup(word_a.id).await.unwrap();
        let view_b = dict.lookup(word_b.id).await.unwrap().unwrap();

        // Second word resolves from the persisted entry, not the source
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(view_b.definition.as_deref(), Some("A fortunate discovery"));
    }

    #[tokio::test]
    async fn missing_headword_yields_entryless_view_without_a_row() {
        let source = Arc::new(StubSource::empty());
        let (store, dict, _dir) = test_setup(source.clone()).await;

        let doc = store.create_document(None).await.unwrap();
        let word = store.add_word(doc.id, "xyzzy").await.unwrap();

        let view = dict.lookup(word.id).await.unwrap().unwrap();
        assert!(view.definition.is_none());
        assert!(view.phonetic.is_none());
        assert_eq!(view.headword, "xyzzy");

        // No negative caching in the database
        assert!(store.dictionary_entry("xyzzy").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_failure_degrades_and_is_not_cached() {
        let source = Arc::new(StubSource::failing());
        let (store, dict, _dir) = test_setup(source.clone()).await;

        let doc = store.create_document(None).await.unwrap();
        let word = store.add_word(doc.id, "flaky").await.unwrap();

        let view = dict.lookup(word.id).await.unwrap().unwrap();
        assert!(view.definition.is_none());

        // A retry goes back to the source instead of a cached failure
        dict.lookup(word.id).await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failed_override_read_does_not_leave_a_stuck_placeholder() {
        let source = Arc::new(StubSource::with_entry(sample_entry("stuck")));
        let (store, dict, _dir) = test_setup(source.clone()).await;

        let doc = store.create_document(None).await.unwrap();
        let word = store.add_word(doc.id, "stuck").await.unwrap();

        // Break the override read that runs after the entry resolves
        store
            .client()
            .execute("ALTER TABLE word_overrides RENAME TO word_overrides_gone", vec![])
            .await
            .unwrap();
        assert!(dict.lookup(word.id).await.is_err());

        store
            .client()
            .execute("ALTER TABLE word_overrides_gone RENAME TO word_overrides", vec![])
            .await
            .unwrap();

        // Once the store recovers the word resolves fully instead of
        // replaying a cached loading placeholder
        let view = dict.lookup(word.id).await.unwrap().unwrap();
        assert!(!view.is_loading);
        assert_eq!(view.definition.as_deref(), Some("A fortunate discovery"));
    }

    #[tokio::test]
    async fn missing_word_row_resolves_to_none() {
        let source = Arc::new(StubSource::empty());
        let (_store, dict, _dir) = test_setup(source.clone()).await;

        assert!(dict.lookup(4242).await.unwrap().is_none());
        // Nothing to look up, so nothing was fetched
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn override_shadows_entry_fields() {
        let source = Arc::new(StubSource::with_entry(sample_entry("gloss")));
        let (store, dict, _dir) = test_setup(source).await;

        let doc = store.create_document(None).await.unwrap();
        let word = store.add_word(doc.id, "gloss").await.unwrap();

        let before = dict.lookup(word.id).await.unwrap().unwrap();
        assert_eq!(before.definition.as_deref(), Some("A fortunate discovery"));

        let after = dict
            .update_override(
                word.id,
                &OverridePatch {
                    custom_definition: Some("My own words".to_string()),
                    notes: Some("From chapter 3".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(after.custom_definition.as_deref(), Some("My own words"));
        assert_eq!(after.notes.as_deref(), Some("From chapter 3"));
        // Dictionary fields are untouched by the override
        assert_eq!(after.definition.as_deref(), Some("A fortunate discovery"));
        assert_eq!(after.part_of_speech.as_deref(), Some("noun"));
    }

    #[test]
    fn payload_prefers_audio_bearing_phonetic() {
        let payload: Vec<ApiEntry> = serde_json::from_str(
            r#"[{
                "word": "hello",
                "phonetic": "/top/",
                "phonetics": [
                    {"text": "/no-audio/", "audio": ""},
                    {"text": "/spoken/", "audio": "https://example.com/hello.mp3"}
                ],
                "meanings": [{
                    "partOfSpeech": "interjection",
                    "definitions": [
                        {"definition": "A greeting", "synonyms": ["hi"]}
                    ],
                    "synonyms": ["greetings", "hi"]
                }]
            }]"#,
        )
        .unwrap();

        let entry = entry_from_payload("hello", &payload).unwrap();
        assert_eq!(entry.phonetic.as_deref(), Some("/spoken/"));
        assert_eq!(
            entry.audio_url.as_deref(),
            Some("https://example.com/hello.mp3")
        );
        assert_eq!(entry.part_of_speech.as_deref(), Some("interjection"));
        assert_eq!(entry.definition.as_deref(), Some("A greeting"));
        // Union of meaning- and definition-level synonyms, deduplicated
        assert_eq!(entry.synonyms, vec!["greetings", "hi"]);
    }

    #[test]
    fn payload_synonyms_are_capped() {
        let synonyms: Vec<String> = (0..20).map(|i| format!("syn{}", i)).collect();
        let payload = vec![ApiEntry {
            phonetic: None,
            phonetics: vec![],
            meanings: vec![ApiMeaning {
                part_of_speech: Some("noun".to_string()),
                definitions: vec![],
                synonyms,
            }],
        }];

        let entry = entry_from_payload("wordy", &payload).unwrap();
        assert_eq!(entry.synonyms.len(), SYNONYM_CAP);
    }

    #[test]
    fn empty_payload_is_no_entry() {
        assert!(entry_from_payload("void", &[]).is_none());
    }
}
