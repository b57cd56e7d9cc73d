//! Storage engine
//!
//! An embedded SQLite database owned by a single worker thread (the
//! host), reached only through an asynchronous request/response protocol.
//!
//! ## Architecture
//!
//! - **Host**: exclusive owner of the connection; executes all SQL
//! - **Protocol**: correlation-id-tagged requests and replies
//! - **Schema**: declarative tables plus an ordered migration runner
//!
//! The client side of the boundary lives in [`crate::bridge`].

pub mod error;
pub mod host;
pub mod protocol;
pub mod schema;

pub use error::EngineError;
pub use host::{spawn, EngineHandle};
pub use protocol::{Backend, ExecOutcome, Request, Row, Value};
pub use schema::SCHEMA_VERSION;
