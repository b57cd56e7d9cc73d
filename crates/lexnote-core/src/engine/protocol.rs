//! Engine protocol message types
//!
//! Requests and responses exchanged between the client bridge and the
//! storage engine host. Every request travels in an [`Envelope`] carrying
//! a caller-chosen correlation id; the matching [`Reply`] echoes the same
//! id with either a success payload or a tagged failure.

use anyhow::{anyhow, Result};

/// Correlation id for matching replies to requests
pub type RequestId = u64;

/// A request to the storage engine host
#[derive(Debug, Clone)]
pub enum Request {
    /// Open (or create) the database, running migrations
    Init,
    /// Run a statement with no result rows expected
    Exec { sql: String, params: Vec<Value> },
    /// Run a statement and collect all result rows
    Query { sql: String, params: Vec<Value> },
    /// Serialize the entire database to one byte buffer
    Export,
    /// Replace the database with a serialized buffer
    Import { data: Vec<u8> },
    /// Release the database handle
    Close,
}

/// A request envelope with its correlation id
#[derive(Debug)]
pub struct Envelope {
    pub id: RequestId,
    pub request: Request,
}

/// Which storage backend the host ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// File-backed database at the configured path
    Durable,
    /// Non-persistent in-memory fallback
    Memory,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Durable => write!(f, "durable"),
            Backend::Memory => write!(f, "in-memory"),
        }
    }
}

/// Result of an `Exec` request
#[derive(Debug, Clone, Copy)]
pub struct ExecOutcome {
    /// Number of rows changed by the statement
    pub rows_affected: usize,
    /// `last_insert_rowid` after the statement — how callers capture a
    /// freshly inserted row's id without re-querying
    pub last_insert_id: i64,
}

/// Success payloads, one per request variant
#[derive(Debug)]
pub enum Payload {
    Initialized { backend: Backend },
    ExecDone(ExecOutcome),
    Rows(Vec<Row>),
    Exported(Vec<u8>),
    Imported { backend: Backend },
    Closed,
}

/// Tagged failures reported by the host
#[derive(Debug, Clone)]
pub enum Failure {
    /// Operation attempted with no open handle
    NotInitialized,
    /// Imported blob rejected before any data was touched
    InvalidImport(String),
    /// Any other engine-side error, stringified
    Message(String),
}

/// A reply from the host, echoing the request's correlation id
#[derive(Debug)]
pub struct Reply {
    pub id: RequestId,
    pub result: Result<Payload, Failure>,
}

/// A SQL value crossing the engine boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Value> for rusqlite::types::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => rusqlite::types::Value::Null,
            Value::Integer(i) => rusqlite::types::Value::Integer(i),
            Value::Real(r) => rusqlite::types::Value::Real(r),
            Value::Text(s) => rusqlite::types::Value::Text(s),
            Value::Blob(b) => rusqlite::types::Value::Blob(b),
        }
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(v: rusqlite::types::Value) -> Self {
        match v {
            rusqlite::types::Value::Null => Value::Null,
            rusqlite::types::Value::Integer(i) => Value::Integer(i),
            rusqlite::types::Value::Real(r) => Value::Real(r),
            rusqlite::types::Value::Text(s) => Value::Text(s),
            rusqlite::types::Value::Blob(b) => Value::Blob(b),
        }
    }
}

/// One result row: ordered field-name-to-value pairs
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Raw value by column name
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, v)| v)
    }

    /// Required integer column
    pub fn i64(&self, name: &str) -> Result<i64> {
        match self.value(name) {
            Some(Value::Integer(i)) => Ok(*i),
            other => Err(anyhow!("column {:?} is not an integer: {:?}", name, other)),
        }
    }

    /// Required text column
    pub fn text(&self, name: &str) -> Result<String> {
        match self.value(name) {
            Some(Value::Text(s)) => Ok(s.clone()),
            other => Err(anyhow!("column {:?} is not text: {:?}", name, other)),
        }
    }

    /// Nullable text column
    pub fn opt_text(&self, name: &str) -> Result<Option<String>> {
        match self.value(name) {
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(Value::Null) | None => Ok(None),
            other => Err(anyhow!("column {:?} is not text: {:?}", name, other)),
        }
    }
}
