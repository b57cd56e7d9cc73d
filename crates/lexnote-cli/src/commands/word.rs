//! Vocabulary word command handlers

use anyhow::{anyhow, Context, Result};

use lexnote_core::{content, stats, ContentNode, Dictionary, Mark, OverridePatch, Store};

use crate::prompt::confirm;
use crate::output::Output;

/// Mark a vocabulary word on a document: insert the word row, then
/// append the marked text to the stored content tree
pub async fn add(store: &Store, document_id: i64, headword: String, output: &Output) -> Result<()> {
    let doc = store
        .get_document(document_id)
        .await?
        .ok_or_else(|| anyhow!("Document not found: {}", document_id))?;

    let word = store.add_word(document_id, &headword).await?;

    let mut tree: ContentNode =
        serde_json::from_str(&doc.content_json).context("Malformed document content")?;
    tree.content.push(ContentNode::container(
        "paragraph",
        vec![ContentNode::text(word.headword.clone()).with_mark(Mark::vocab(word.id))],
    ));
    store.save_content(doc.id, &tree).await?;

    // Content and vocab count changed, refresh the stats row
    stats::recompute(store, document_id, &tree).await?;

    output.success(&format!(
        "Added word {}: {} ({})",
        word.id, word.headword, word.headword_norm
    ));
    if output.is_quiet() {
        println!("{}", word.id);
    }
    Ok(())
}

/// List a document's vocabulary words
pub async fn list(store: &Store, document_id: i64, output: &Output) -> Result<()> {
    let doc = store
        .get_document(document_id)
        .await?
        .ok_or_else(|| anyhow!("Document not found: {}", document_id))?;
    let words = store.words_for_document(document_id).await?;

    output.print_words(&doc, &words);
    Ok(())
}

/// Look up a word and print its merged view
pub async fn show(dictionary: &Dictionary, id: i64, output: &Output) -> Result<()> {
    let view = dictionary
        .lookup(id)
        .await?
        .ok_or_else(|| anyhow!("Word not found: {}", id))?;
    output.print_word_view(&view);
    Ok(())
}

/// Attach or update personal notes and overrides on a word
pub async fn note(
    store: &Store,
    dictionary: &Dictionary,
    id: i64,
    definition: Option<String>,
    phonetic: Option<String>,
    notes: Option<String>,
    output: &Output,
) -> Result<()> {
    store
        .get_word(id)
        .await?
        .ok_or_else(|| anyhow!("Word not found: {}", id))?;

    let patch = OverridePatch {
        custom_definition: definition,
        custom_phonetic: phonetic,
        notes,
    };
    if patch.is_empty() {
        anyhow::bail!("Nothing to set. Use --definition, --phonetic, or --notes.");
    }

    let view = dictionary.update_override(id, &patch).await?;
    output.success(&format!("Updated notes for: {}", view.headword));
    output.print_word_view(&view);
    Ok(())
}

/// Unmark a word: strip its inline mark from the document content,
/// then remove its row and override
pub async fn delete(store: &Store, id: i64, output: &Output) -> Result<()> {
    let word = store
        .get_word(id)
        .await?
        .ok_or_else(|| anyhow!("Word not found: {}", id))?;

    if output.should_prompt() {
        println!("Unmark word {}: {}", word.id, word.headword);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let doc = store
        .get_document(word.document_id)
        .await?
        .ok_or_else(|| anyhow!("Document not found: {}", word.document_id))?;
    let tree: ContentNode =
        serde_json::from_str(&doc.content_json).context("Malformed document content")?;

    // The text stays, only the mark goes
    if content::contains_word_mark(&tree, word.id) {
        let stripped = content::strip_word_mark(&tree, word.id);
        store.save_content(doc.id, &stripped).await?;
    }

    store.delete_word(id).await?;
    recompute_stats(store, doc.id).await?;

    output.success(&format!("Unmarked word: {}", word.headword));
    Ok(())
}

async fn recompute_stats(store: &Store, document_id: i64) -> Result<()> {
    if let Some(doc) = store.get_document(document_id).await? {
        let tree: ContentNode =
            serde_json::from_str(&doc.content_json).context("Malformed document content")?;
        stats::recompute(store, document_id, &tree).await?;
    }
    Ok(())
}
