//! Storage client bridge
//!
//! Turns the host's message protocol into ordinary call/return semantics.
//! Each call sends one tagged request and awaits the reply with the
//! matching correlation id; a dispatcher task routes incoming replies to
//! their waiting callers. Replies for unknown ids (stale after a
//! reinitialization) are dropped with a debug log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::Config;
use crate::engine::protocol::{
    Backend, Envelope, ExecOutcome, Failure, Payload, Reply, Request, RequestId, Row, Value,
};
use crate::engine::{self, EngineError, EngineHandle};

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Payload, Failure>>>>>;

/// Promise-style client for the storage engine host
pub struct StorageClient {
    handle: EngineHandle,
    pending: PendingMap,
    next_id: AtomicU64,
    ready: AtomicBool,
    /// Guards initialization so concurrent callers share one attempt
    init_state: tokio::sync::Mutex<Option<Backend>>,
}

impl StorageClient {
    /// Spawn the engine host and the reply dispatcher.
    ///
    /// The client is not usable until [`StorageClient::initialize`]
    /// completes.
    pub fn connect(config: Config) -> Arc<Self> {
        let (handle, reply_rx) = engine::spawn(config);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(dispatch_replies(reply_rx, Arc::clone(&pending)));

        Arc::new(Self {
            handle,
            pending,
            next_id: AtomicU64::new(1),
            ready: AtomicBool::new(false),
            init_state: tokio::sync::Mutex::new(None),
        })
    }

    /// Open the database, running migrations.
    ///
    /// Idempotent: concurrent callers during startup all await the same
    /// single attempt, and later callers get the recorded backend without
    /// another round trip.
    pub async fn initialize(&self) -> Result<Backend, EngineError> {
        let mut state = self.init_state.lock().await;
        if let Some(backend) = *state {
            return Ok(backend);
        }

        match self.request(Request::Init).await? {
            Payload::Initialized { backend } => {
                self.ready.store(true, Ordering::SeqCst);
                *state = Some(backend);
                Ok(backend)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Run a statement with no result rows expected
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<ExecOutcome, EngineError> {
        self.ensure_ready()?;
        match self
            .request(Request::Exec {
                sql: sql.into(),
                params,
            })
            .await?
        {
            Payload::ExecDone(outcome) => Ok(outcome),
            other => Err(unexpected(&other)),
        }
    }

    /// Run a statement and collect all result rows
    pub async fn query(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Vec<Row>, EngineError> {
        self.ensure_ready()?;
        match self
            .request(Request::Query {
                sql: sql.into(),
                params,
            })
            .await?
        {
            Payload::Rows(rows) => Ok(rows),
            other => Err(unexpected(&other)),
        }
    }

    /// Serialize the entire database to one byte buffer
    pub async fn export(&self) -> Result<Vec<u8>, EngineError> {
        self.ensure_ready()?;
        match self.request(Request::Export).await? {
            Payload::Exported(bytes) => Ok(bytes),
            other => Err(unexpected(&other)),
        }
    }

    /// Replace the database with a previously exported buffer
    pub async fn import(&self, data: Vec<u8>) -> Result<Backend, EngineError> {
        self.ensure_ready()?;
        match self.request(Request::Import { data }).await? {
            Payload::Imported { backend } => {
                let mut state = self.init_state.lock().await;
                *state = Some(backend);
                Ok(backend)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Release the database handle.
    ///
    /// The client must be reinitialized before further use.
    pub async fn close(&self) -> Result<(), EngineError> {
        let mut state = self.init_state.lock().await;
        match self.request(Request::Close).await? {
            Payload::Closed => {
                self.ready.store(false, Ordering::SeqCst);
                *state = None;
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    /// Send one envelope and await its correlated reply
    async fn request(&self, request: Request) -> Result<Payload, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().expect("pending map lock poisoned");
            pending.insert(id, tx);
        }

        if self.handle.send(Envelope { id, request }).is_err() {
            let mut pending = self.pending.lock().expect("pending map lock poisoned");
            pending.remove(&id);
            return Err(EngineError::ChannelClosed);
        }

        let result = rx.await.map_err(|_| EngineError::ChannelClosed)?;
        result.map_err(EngineError::from)
    }
}

impl From<Failure> for EngineError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::NotInitialized => EngineError::NotInitialized,
            Failure::InvalidImport(msg) => EngineError::InvalidImport(msg),
            Failure::Message(msg) => EngineError::Engine(msg),
        }
    }
}

fn unexpected(payload: &Payload) -> EngineError {
    EngineError::Engine(format!("unexpected response payload: {:?}", payload))
}

/// Route replies to their waiting callers by correlation id
async fn dispatch_replies(mut reply_rx: mpsc::UnboundedReceiver<Reply>, pending: PendingMap) {
    while let Some(Reply { id, result }) = reply_rx.recv().await {
        let waiter = {
            let mut pending = pending.lock().expect("pending map lock poisoned");
            pending.remove(&id)
        };
        match waiter {
            Some(tx) => {
                // A dropped receiver means the caller gave up; fine.
                let _ = tx.send(result);
            }
            None => debug!("dropping reply for unknown request id {id}"),
        }
    }
}
