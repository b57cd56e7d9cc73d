//! Document command handlers

use anyhow::{anyhow, Context, Result};

use lexnote_core::{stats, ContentNode, Store};

use crate::prompt::confirm;
use crate::output::Output;

/// Create a new document
pub async fn create(store: &Store, title: Option<String>, output: &Output) -> Result<()> {
    let doc = store.create_document(title.as_deref()).await?;

    // Seed the stats row so listings have counts right away
    let content: ContentNode =
        serde_json::from_str(&doc.content_json).context("Malformed document content")?;
    stats::recompute(store, doc.id, &content).await?;

    output.success(&format!("Created document {}: {}", doc.id, doc.title));
    if output.is_quiet() {
        println!("{}", doc.id);
    }
    Ok(())
}

/// List all documents
pub async fn list(store: &Store, output: &Output) -> Result<()> {
    let docs = store.list_documents_with_stats().await?;
    output.print_documents(&docs);
    Ok(())
}

/// Show one document with its vocabulary
pub async fn show(store: &Store, id: i64, output: &Output) -> Result<()> {
    let doc = store
        .get_document(id)
        .await?
        .ok_or_else(|| anyhow!("Document not found: {}", id))?;
    let doc_stats = store.stats_for_document(id).await?;
    let words = store.words_for_document(id).await?;

    output.print_document(&doc, doc_stats.as_ref(), &words);
    Ok(())
}

/// Rename a document
pub async fn rename(store: &Store, id: i64, title: String, output: &Output) -> Result<()> {
    store
        .get_document(id)
        .await?
        .ok_or_else(|| anyhow!("Document not found: {}", id))?;

    store.rename_document(id, &title).await?;
    output.success(&format!("Renamed document {} to: {}", id, title));
    Ok(())
}

/// Delete a document and everything attached to it
pub async fn delete(store: &Store, id: i64, output: &Output) -> Result<()> {
    let doc = store
        .get_document(id)
        .await?
        .ok_or_else(|| anyhow!("Document not found: {}", id))?;
    let words = store.words_for_document(id).await?;

    if output.should_prompt() {
        println!("Delete document {}: {}", doc.id, doc.title);
        if !words.is_empty() {
            println!("This also removes {} vocabulary word(s).", words.len());
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_document(id).await?;
    output.success(&format!("Deleted document: {}", id));
    Ok(())
}
