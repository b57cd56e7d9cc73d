//! Rich-text content tree
//!
//! The editor stores documents as a recursive node structure: optional
//! `text`, optional ordered `content` children, and optional `marks`.
//! A vocabulary word is bound to its text span by a `vocab` mark carrying
//! the owning word's id.
//!
//! This module treats the tree as immutable data: transforms return a new
//! tree rather than mutating in place, so the save pipeline stays
//! composable and testable.

use serde::{Deserialize, Serialize};

/// Mark type tag for vocabulary annotations
pub const VOCAB_MARK: &str = "vocab";

/// Maximum snippet length in characters, before the ellipsis
pub const SNIPPET_MAX: usize = 140;

/// A snippet is only trimmed back to a word boundary if the boundary
/// falls past this fraction of the window.
const SNIPPET_BOUNDARY_FRACTION: f32 = 0.7;

/// An inline mark on a span of text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mark {
    /// Mark type tag (e.g. "vocab", "bold")
    #[serde(rename = "type")]
    pub mark_type: String,
    /// Mark attributes
    #[serde(default, skip_serializing_if = "MarkAttrs::is_empty")]
    pub attrs: MarkAttrs,
}

/// Attributes carried by a mark
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarkAttrs {
    /// Owning word row id, for vocabulary marks
    #[serde(rename = "wordId", default, skip_serializing_if = "Option::is_none")]
    pub word_id: Option<i64>,
}

impl MarkAttrs {
    fn is_empty(&self) -> bool {
        self.word_id.is_none()
    }
}

impl Mark {
    /// Create a vocabulary mark bound to a word row
    pub fn vocab(word_id: i64) -> Self {
        Self {
            mark_type: VOCAB_MARK.to_string(),
            attrs: MarkAttrs {
                word_id: Some(word_id),
            },
        }
    }

    /// Whether this is the vocabulary mark for the given word
    fn is_vocab_for(&self, word_id: i64) -> bool {
        self.mark_type == VOCAB_MARK && self.attrs.word_id == Some(word_id)
    }
}

/// A node in the content tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentNode {
    /// Node type tag (e.g. "doc", "paragraph", "heading", "text")
    #[serde(rename = "type")]
    pub node_type: String,
    /// Text payload for leaf nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Ordered children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentNode>,
    /// Marks applied to this node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl ContentNode {
    /// Create a text leaf
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            node_type: "text".to_string(),
            text: Some(text.into()),
            content: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Create a container node with children
    pub fn container(node_type: impl Into<String>, content: Vec<ContentNode>) -> Self {
        Self {
            node_type: node_type.into(),
            text: None,
            content,
            marks: Vec::new(),
        }
    }

    /// Attach a mark to this node
    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }

    /// Whether this node starts a block-level container
    fn is_block(&self) -> bool {
        matches!(self.node_type.as_str(), "paragraph" | "heading")
    }
}

/// The default empty document: a doc with one empty paragraph
pub fn empty_document() -> ContentNode {
    ContentNode::container("doc", vec![ContentNode::container("paragraph", vec![])])
}

/// Extract the plain text of a content tree.
///
/// Depth-first walk concatenating every text leaf, with a single space
/// after each block-level container so adjacent blocks don't merge
/// without a boundary. The result is trimmed.
pub fn plain_text(node: &ContentNode) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out.trim().to_string()
}

fn collect_text(node: &ContentNode, out: &mut String) {
    if let Some(text) = &node.text {
        out.push_str(text);
    }
    for child in &node.content {
        collect_text(child, out);
    }
    if node.is_block() {
        out.push(' ');
    }
}

/// Count words as maximal non-whitespace runs
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Derive a preview snippet from extracted plain text.
///
/// Text up to 140 characters passes through unchanged. Longer text is cut
/// at 140 characters, backed up to the last space when that space falls
/// past 70% of the window (avoids mid-word truncation for Latin script),
/// and suffixed with an ellipsis.
pub fn snippet(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SNIPPET_MAX {
        return text.to_string();
    }

    let window: String = chars[..SNIPPET_MAX].iter().collect();
    let threshold = (SNIPPET_MAX as f32 * SNIPPET_BOUNDARY_FRACTION) as usize;

    match window.rfind(' ') {
        Some(pos) if window[..pos].chars().count() >= threshold => {
            format!("{}…", window[..pos].trim_end())
        }
        _ => format!("{}…", window),
    }
}

/// Return a copy of the tree with the given word's vocabulary mark removed.
///
/// Pure transform: the input tree is untouched. Text spans keep any other
/// marks they carry.
pub fn strip_word_mark(node: &ContentNode, word_id: i64) -> ContentNode {
    ContentNode {
        node_type: node.node_type.clone(),
        text: node.text.clone(),
        content: node
            .content
            .iter()
            .map(|child| strip_word_mark(child, word_id))
            .collect(),
        marks: node
            .marks
            .iter()
            .filter(|mark| !mark.is_vocab_for(word_id))
            .cloned()
            .collect(),
    }
}

/// Whether any node in the tree carries the given word's vocabulary mark
pub fn contains_word_mark(node: &ContentNode, word_id: i64) -> bool {
    node.marks.iter().any(|mark| mark.is_vocab_for(word_id))
        || node
            .content
            .iter()
            .any(|child| contains_word_mark(child, word_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> ContentNode {
        ContentNode::container(
            "doc",
            vec![ContentNode::container(
                "paragraph",
                vec![
                    ContentNode::text("The "),
                    ContentNode::text("quick").with_mark(Mark::vocab(7)),
                    ContentNode::text(" fox"),
                ],
            )],
        )
    }

    #[test]
    fn plain_text_concatenates_leaves() {
        assert_eq!(plain_text(&sample_doc()), "The quick fox");
    }

    #[test]
    fn plain_text_separates_blocks() {
        let doc = ContentNode::container(
            "doc",
            vec![
                ContentNode::container("paragraph", vec![ContentNode::text("First")]),
                ContentNode::container("heading", vec![ContentNode::text("Second")]),
            ],
        );
        assert_eq!(plain_text(&doc), "First Second");
    }

    #[test]
    fn plain_text_of_empty_document_is_empty() {
        assert_eq!(plain_text(&empty_document()), "");
    }

    #[test]
    fn word_count_counts_whitespace_runs() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("The quick fox"), 3);
        assert_eq!(word_count("one\ttwo\n three"), 3);
    }

    #[test]
    fn snippet_passes_short_text_through() {
        assert_eq!(snippet("The quick fox"), "The quick fox");
        let exactly_140 = "x".repeat(140);
        assert_eq!(snippet(&exactly_140), exactly_140);
    }

    #[test]
    fn snippet_breaks_at_late_space() {
        // 200 chars with a space at position 120 (inside the window,
        // past the 98-char threshold)
        let text = format!("{} {}", "a".repeat(120), "b".repeat(79));
        let result = snippet(&text);
        assert_eq!(result, format!("{}…", "a".repeat(120)));
    }

    #[test]
    fn snippet_hard_truncates_without_late_space() {
        // space only at position 50, before the 70% threshold
        let text = format!("{} {}", "a".repeat(50), "b".repeat(149));
        let result = snippet(&text);
        let expected: String = text.chars().take(140).collect();
        assert_eq!(result, format!("{}…", expected));
    }

    #[test]
    fn snippet_hard_truncates_spaceless_text() {
        let text = "y".repeat(200);
        assert_eq!(snippet(&text), format!("{}…", "y".repeat(140)));
    }

    #[test]
    fn strip_word_mark_removes_only_matching_mark() {
        let doc = sample_doc();
        let stripped = strip_word_mark(&doc, 7);

        assert!(!contains_word_mark(&stripped, 7));
        // original untouched
        assert!(contains_word_mark(&doc, 7));
        // text preserved
        assert_eq!(plain_text(&stripped), "The quick fox");
    }

    #[test]
    fn strip_word_mark_keeps_other_word_marks() {
        let doc = ContentNode::container(
            "doc",
            vec![ContentNode::container(
                "paragraph",
                vec![
                    ContentNode::text("alpha").with_mark(Mark::vocab(1)),
                    ContentNode::text("beta").with_mark(Mark::vocab(2)),
                ],
            )],
        );
        let stripped = strip_word_mark(&doc, 1);
        assert!(!contains_word_mark(&stripped, 1));
        assert!(contains_word_mark(&stripped, 2));
    }

    #[test]
    fn content_round_trips_through_json() {
        let doc = sample_doc();
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: ContentNode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);

        // mark attribute uses the editor's camelCase key
        assert!(json.contains("\"wordId\":7"));
    }
}
