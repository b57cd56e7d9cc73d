//! Document statistics
//!
//! Recomputes a document's derived stats row (preview snippet, word
//! count, vocabulary count) from its content tree. Recomputation runs
//! after every content save; it is advisory, so failures are logged and
//! never surfaced to the editing path.

use anyhow::Result;

use crate::content::ContentNode;
use crate::store::Store;

/// Recompute and persist the stats row for one document
pub async fn recompute(store: &Store, document_id: i64, content: &ContentNode) -> Result<()> {
    let text = crate::content::plain_text(content);
    let snippet = crate::content::snippet(&text);
    let word_count = crate::content::word_count(&text) as i64;
    let vocab_count = store.vocab_count(document_id).await?;

    store
        .upsert_stats(document_id, &snippet, word_count, vocab_count)
        .await
}

/// Recompute in a detached task so the save path never waits on it
pub fn spawn_recompute(store: Store, document_id: i64, content: ContentNode) {
    tokio::spawn(async move {
        if let Err(err) = recompute(&store, document_id, &content).await {
            tracing::warn!(document_id, error = %err, "Stats recompute failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::StorageClient;
    use crate::config::Config;
    use crate::content::{Mark, SNIPPET_MAX};

    async fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let client = StorageClient::connect(Config::with_data_dir(dir.path()));
        client.initialize().await.unwrap();
        (Store::new(client), dir)
    }

    fn paragraph(texts: Vec<ContentNode>) -> ContentNode {
        ContentNode::container("paragraph", texts)
    }

    #[tokio::test]
    async fn recompute_counts_words_and_vocab() {
        let (store, _dir) = test_store().await;
        let doc = store.create_document(None).await.unwrap();
        let word = store.add_word(doc.id, "quick").await.unwrap();

        let content = ContentNode::container(
            "doc",
            vec![paragraph(vec![
                ContentNode::text("The "),
                ContentNode::text("quick").with_mark(Mark::vocab(word.id)),
                ContentNode::text(" fox"),
            ])],
        );

        recompute(&store, doc.id, &content).await.unwrap();

        let stats = store.stats_for_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stats.word_count, 3);
        assert_eq!(stats.vocab_count, 1);
        assert_eq!(stats.snippet, "The quick fox");
    }

    #[tokio::test]
    async fn recompute_snips_long_content() {
        let (store, _dir) = test_store().await;
        let doc = store.create_document(None).await.unwrap();

        let long = "lorem ipsum dolor sit amet ".repeat(20);
        let content = ContentNode::container(
            "doc",
            vec![paragraph(vec![ContentNode::text(long)])],
        );

        recompute(&store, doc.id, &content).await.unwrap();

        let stats = store.stats_for_document(doc.id).await.unwrap().unwrap();
        assert!(stats.snippet.ends_with('…'));
        assert!(stats.snippet.chars().count() <= SNIPPET_MAX + 1);
    }

    #[tokio::test]
    async fn recompute_handles_empty_document() {
        let (store, _dir) = test_store().await;
        let doc = store.create_document(None).await.unwrap();

        recompute(&store, doc.id, &crate::content::empty_document())
            .await
            .unwrap();

        let stats = store.stats_for_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stats.word_count, 0);
        assert_eq!(stats.vocab_count, 0);
        assert_eq!(stats.snippet, "");
    }

    #[tokio::test]
    async fn recompute_replaces_stale_stats() {
        let (store, _dir) = test_store().await;
        let doc = store.create_document(None).await.unwrap();
        store.upsert_stats(doc.id, "stale", 99, 9).await.unwrap();

        let content = ContentNode::container(
            "doc",
            vec![paragraph(vec![ContentNode::text("fresh words")])],
        );
        recompute(&store, doc.id, &content).await.unwrap();

        let stats = store.stats_for_document(doc.id).await.unwrap().unwrap();
        assert_eq!(stats.snippet, "fresh words");
        assert_eq!(stats.word_count, 2);
    }

    #[tokio::test]
    async fn spawned_recompute_lands() {
        let (store, _dir) = test_store().await;
        let doc = store.create_document(None).await.unwrap();

        let content = ContentNode::container(
            "doc",
            vec![paragraph(vec![ContentNode::text("background words")])],
        );
        spawn_recompute(store.clone(), doc.id, content);

        // Detached task, so poll for the row
        for _ in 0..100 {
            if store.stats_for_document(doc.id).await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("stats row never appeared");
    }
}
