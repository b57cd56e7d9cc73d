//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use lexnote_core::{Document, DocumentStats, Word, WordView};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single document with its stats and words
    pub fn print_document(&self, doc: &Document, stats: Option<&DocumentStats>, words: &[Word]) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", doc.id);
                println!("Title:   {}", doc.title);
                println!("Created: {}", doc.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated: {}", doc.updated_at.format("%Y-%m-%d %H:%M"));
                if let Some(stats) = stats {
                    println!("Words:   {} ({} marked)", stats.word_count, stats.vocab_count);
                    if !stats.snippet.is_empty() {
                        println!("Preview: {}", stats.snippet);
                    }
                }

                if !words.is_empty() {
                    println!();
                    println!("── Vocabulary ({}) ──", words.len());
                    for word in words {
                        println!(
                            "{:>5}  {}  [{}]",
                            word.id,
                            word.headword,
                            word.created_at.format("%Y-%m-%d")
                        );
                    }
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "document": doc,
                        "stats": stats,
                        "words": words
                    }))
                    .unwrap()
                );
            }
            OutputFormat::Quiet => {
                println!("{}", doc.id);
            }
        }
    }

    /// Print a list of documents with their stats
    pub fn print_documents(&self, docs: &[(Document, Option<DocumentStats>)]) {
        match self.format {
            OutputFormat::Human => {
                if docs.is_empty() {
                    println!("No documents found.");
                    return;
                }
                for (doc, stats) in docs {
                    let counts = match stats {
                        Some(s) => format!(" ({} words, {} marked)", s.word_count, s.vocab_count),
                        None => String::new(),
                    };
                    println!(
                        "{:>5} | {}{} | {}",
                        doc.id,
                        truncate(&doc.title, 35),
                        counts,
                        doc.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\n{} document(s)", docs.len());
            }
            OutputFormat::Json => {
                let items: Vec<_> = docs
                    .iter()
                    .map(|(doc, stats)| serde_json::json!({"document": doc, "stats": stats}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items).unwrap());
            }
            OutputFormat::Quiet => {
                for (doc, _) in docs {
                    println!("{}", doc.id);
                }
            }
        }
    }

    /// Print a document's vocabulary words
    pub fn print_words(&self, doc: &Document, words: &[Word]) {
        match self.format {
            OutputFormat::Human => {
                println!("Vocabulary for: {} - {}", doc.id, doc.title);
                println!();

                if words.is_empty() {
                    println!("No words marked in this document.");
                    return;
                }

                for word in words {
                    println!(
                        "{:>5}  {}  [{}]",
                        word.id,
                        word.headword,
                        word.created_at.format("%Y-%m-%d")
                    );
                }
                println!("\n{} word(s)", words.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(words).unwrap());
            }
            OutputFormat::Quiet => {
                for word in words {
                    println!("{}", word.id);
                }
            }
        }
    }

    /// Print a resolved word view (dictionary fields plus overrides)
    pub fn print_word_view(&self, view: &WordView) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", view.headword);
                if let Some(ref phonetic) = view.custom_phonetic {
                    println!("Phonetic:   {} (yours)", phonetic);
                } else if let Some(ref phonetic) = view.phonetic {
                    println!("Phonetic:   {}", phonetic);
                }
                if let Some(ref pos) = view.part_of_speech {
                    println!("Part:       {}", pos);
                }
                if let Some(ref definition) = view.custom_definition {
                    println!("Definition: {} (yours)", definition);
                } else if let Some(ref definition) = view.definition {
                    println!("Definition: {}", definition);
                } else {
                    println!("Definition: (none found)");
                }
                if !view.synonyms.is_empty() {
                    println!("Synonyms:   {}", view.synonyms.join(", "));
                }
                if let Some(ref audio) = view.audio_url {
                    println!("Audio:      {}", audio);
                }
                if let Some(ref notes) = view.notes {
                    println!();
                    println!("Notes: {}", notes);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(view).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", view.word_id);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
