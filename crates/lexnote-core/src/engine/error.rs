//! Storage engine error handling
//!
//! Failures crossing the host boundary arrive as tagged `Failure` values
//! (see `protocol`); the bridge converts them into this typed error for
//! callers.

use thiserror::Error;

/// Errors surfaced by the storage engine and its client bridge
#[derive(Error, Debug)]
pub enum EngineError {
    /// An operation was attempted before `init` (or after `close`)
    #[error("storage engine is not initialized")]
    NotInitialized,

    /// The imported blob did not contain the expected schema
    #[error("import rejected: {0}")]
    InvalidImport(String),

    /// The host worker is gone (request or response channel closed)
    #[error("storage engine worker is no longer running")]
    ChannelClosed,

    /// SQLite-level error on the client side
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error on the client side
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure reported by the host for a specific request
    #[error("{0}")]
    Engine(String),
}
