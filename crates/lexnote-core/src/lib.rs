//! LexNote Core Library
//!
//! This crate provides the core functionality for LexNote, a vocabulary
//! note editor with a local embedded database.
//!
//! # Architecture
//!
//! - **Engine**: a dedicated worker thread owns the only SQLite
//!   connection; everything else talks to it through a correlation-id
//!   message bridge
//!
//! All reads and writes flow through the bridge, so callers never touch
//! the connection directly.
//!
//! # Quick Start
//!
//! ```text
//! let client = StorageClient::connect(Config::load()?);
//! client.initialize().await?;
//! let store = Store::new(client);
//!
//! // Create a document and mark a word in it
//! let doc = store.create_document(Some("Reading notes")).await?;
//! let word = store.add_word(doc.id, "serendipity").await?;
//! ```
//!
//! # Modules
//!
//! - `store`: typed data access layer (main entry point)
//! - `bridge`: async client over the engine's message channel
//! - `engine`: worker-thread SQLite host, protocol, schema
//! - `models`: data structures for documents, words, and entries
//! - `content`: rich-text content tree and derived text
//! - `headword`: vocabulary word normalization and validation
//! - `dictionary`: dictionary lookups with a session cache
//! - `stats`: document statistics recomputation
//! - `config`: application configuration

pub mod bridge;
pub mod config;
pub mod content;
pub mod dictionary;
pub mod engine;
pub mod headword;
pub mod models;
pub mod stats;
pub mod store;

pub use bridge::StorageClient;
pub use config::Config;
pub use content::{ContentNode, Mark};
pub use dictionary::{Dictionary, DictionarySource, HttpDictionarySource};
pub use engine::{Backend, EngineError, SCHEMA_VERSION};
pub use headword::HeadwordError;
pub use models::{
    DictionaryEntry, Document, DocumentStats, OverridePatch, Word, WordOverride, WordView,
};
pub use store::Store;
