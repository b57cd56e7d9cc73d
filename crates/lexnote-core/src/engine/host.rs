//! Storage engine host
//!
//! The host runs on a dedicated worker thread and owns the only live
//! `rusqlite::Connection`. Requests arrive over a channel and are
//! processed strictly in arrival order; every reply echoes the request's
//! correlation id. The handle never leaves this thread.
//!
//! `init` prefers the file-backed database at `Config::sqlite_path()` and
//! falls back to a non-persistent in-memory database when that cannot be
//! opened — callers always get a working handle, with persistence as a
//! best-effort property.

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::{
    Backend, Envelope, ExecOutcome, Failure, Payload, Reply, Request, Row, Value,
};
use super::schema;
use crate::config::Config;

/// Pages copied per backup step when loading an import into memory
const BACKUP_PAGES_PER_STEP: std::os::raw::c_int = 64;

/// Sending half of the host's request channel
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EngineHandle {
    /// Queue a request for the host; fails when the worker is gone
    pub fn send(&self, envelope: Envelope) -> std::result::Result<(), Envelope> {
        self.tx.send(envelope).map_err(|err| err.0)
    }
}

/// Spawn the host worker thread.
///
/// Returns the request handle and the reply stream. The worker exits
/// when every `EngineHandle` clone has been dropped.
pub fn spawn(config: Config) -> (EngineHandle, mpsc::UnboundedReceiver<Reply>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("lexnote-engine".to_string())
        .spawn(move || host_loop(config, request_rx, reply_tx))
        .expect("failed to spawn storage engine thread");

    (EngineHandle { tx: request_tx }, reply_rx)
}

fn host_loop(
    config: Config,
    mut request_rx: mpsc::UnboundedReceiver<Envelope>,
    reply_tx: mpsc::UnboundedSender<Reply>,
) {
    let mut host = Host {
        config,
        state: None,
    };

    while let Some(Envelope { id, request }) = request_rx.blocking_recv() {
        let result = host.handle(request);
        if reply_tx.send(Reply { id, result }).is_err() {
            // Client side is gone; nothing left to serve.
            break;
        }
    }
    debug!("storage engine worker exiting");
}

struct Host {
    config: Config,
    state: Option<(Connection, Backend)>,
}

impl Host {
    /// Dispatch one request. Errors never escape this function as
    /// panics; each becomes a tagged failure in the reply.
    fn handle(&mut self, request: Request) -> std::result::Result<Payload, Failure> {
        match request {
            Request::Init => self.init(),
            Request::Exec { sql, params } => self.exec(&sql, params),
            Request::Query { sql, params } => self.query(&sql, params),
            Request::Export => self.export(),
            Request::Import { data } => self.import(&data),
            Request::Close => {
                self.state = None;
                Ok(Payload::Closed)
            }
        }
    }

    fn conn(&self) -> std::result::Result<&Connection, Failure> {
        self.state
            .as_ref()
            .map(|(conn, _)| conn)
            .ok_or(Failure::NotInitialized)
    }

    fn init(&mut self) -> std::result::Result<Payload, Failure> {
        if let Some((_, backend)) = &self.state {
            return Ok(Payload::Initialized { backend: *backend });
        }

        let (conn, backend) = self.open_preferred().map_err(message)?;
        self.state = Some((conn, backend));
        Ok(Payload::Initialized { backend })
    }

    /// Open the durable backend, degrading to in-memory on failure
    fn open_preferred(&self) -> Result<(Connection, Backend)> {
        match self.open_durable() {
            Ok(conn) => Ok((conn, Backend::Durable)),
            Err(err) => {
                warn!(
                    "durable storage unavailable ({err:#}), falling back to in-memory database"
                );
                let conn = Connection::open_in_memory()?;
                schema::apply_migrations(&conn)?;
                Ok((conn, Backend::Memory))
            }
        }
    }

    fn open_durable(&self) -> Result<Connection> {
        self.config.ensure_data_dir()?;
        let path = self.config.sqlite_path();
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        schema::apply_migrations(&conn).context("Failed to run schema migrations")?;
        Ok(conn)
    }

    fn exec(&mut self, sql: &str, params: Vec<Value>) -> std::result::Result<Payload, Failure> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                sql,
                params_from_iter(params.into_iter().map(rusqlite::types::Value::from)),
            )
            .map_err(message)?;
        Ok(Payload::ExecDone(ExecOutcome {
            rows_affected,
            last_insert_id: conn.last_insert_rowid(),
        }))
    }

    fn query(&mut self, sql: &str, params: Vec<Value>) -> std::result::Result<Payload, Failure> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(message)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(params_from_iter(
                params.into_iter().map(rusqlite::types::Value::from),
            ))
            .map_err(message)?;

        let mut out = Vec::new();
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let mut fields = Vec::with_capacity(columns.len());
                    for (i, name) in columns.iter().enumerate() {
                        let value: rusqlite::types::Value =
                            row.get_ref(i).map_err(message)?.into();
                        fields.push((name.clone(), Value::from(value)));
                    }
                    out.push(Row::new(fields));
                }
                Ok(None) => break,
                Err(err) => return Err(message(err)),
            }
        }
        Ok(Payload::Rows(out))
    }

    /// Serialize the whole database to one byte buffer via VACUUM INTO
    fn export(&mut self) -> std::result::Result<Payload, Failure> {
        let conn = self.conn()?;
        let bytes = export_bytes(conn).map_err(message)?;
        Ok(Payload::Exported(bytes))
    }

    /// Replace the database with a serialized buffer.
    ///
    /// The blob is validated before the current handle is touched; a blob
    /// without a `documents` table is rejected outright.
    fn import(&mut self, data: &[u8]) -> std::result::Result<Payload, Failure> {
        let scratch = tempfile::tempdir().map_err(message)?;
        let source_path = scratch.path().join("import.db");
        fs::write(&source_path, data).map_err(message)?;

        let source = Connection::open(&source_path).map_err(message)?;
        if !has_documents_table(&source).map_err(message)? {
            return Err(Failure::InvalidImport(
                "database has no documents table".to_string(),
            ));
        }

        // Validated: now drop the current handle and rebuild.
        self.state = None;

        let (conn, backend) = self
            .rebuild_from(&source)
            .context("Failed to rebuild database from import")
            .map_err(message)?;
        self.state = Some((conn, backend));
        Ok(Payload::Imported { backend })
    }

    /// Recreate the durable handle from an import source, or load the
    /// source straight into memory when the durable backend is gone.
    ///
    /// The replay targets a staging file next to the real database and
    /// only moves it into place after the copy commits, so a replay
    /// failure leaves the previous database file untouched.
    fn rebuild_from(&self, source: &Connection) -> Result<(Connection, Backend)> {
        let path = self.config.sqlite_path();
        let staged = self.config.ensure_data_dir().and_then(|_| {
            let mut name = path.as_os_str().to_os_string();
            name.push(".import");
            let staging = std::path::PathBuf::from(name);
            let _ = fs::remove_file(&staging);
            let conn = Connection::open(&staging)
                .with_context(|| format!("Failed to open staging database at {:?}", staging))?;
            Ok((conn, staging))
        });

        match staged {
            Ok((mut dest, staging)) => {
                let replayed = replay_database(source, &mut dest)
                    .and_then(|_| schema::apply_migrations(&dest).map_err(anyhow::Error::from));
                if let Err(err) = replayed {
                    drop(dest);
                    let _ = fs::remove_file(&staging);
                    return Err(err);
                }
                drop(dest);

                for suffix in ["", "-wal", "-shm"] {
                    let mut name = path.as_os_str().to_os_string();
                    name.push(suffix);
                    let _ = fs::remove_file(name);
                }
                fs::rename(&staging, &path).with_context(|| {
                    format!("Failed to move imported database into place at {:?}", path)
                })?;

                let conn = Connection::open(&path)
                    .with_context(|| format!("Failed to reopen SQLite database at {:?}", path))?;
                Ok((conn, Backend::Durable))
            }
            Err(err) => {
                warn!("durable storage unavailable on import ({err:#}), loading into memory");
                let mut dest = Connection::open_in_memory()?;
                {
                    let backup = rusqlite::backup::Backup::new(source, &mut dest)?;
                    backup.run_to_completion(
                        BACKUP_PAGES_PER_STEP,
                        Duration::from_millis(0),
                        None,
                    )?;
                }
                schema::apply_migrations(&dest)?;
                Ok((dest, Backend::Memory))
            }
        }
    }
}

/// Convert any error into a boundary failure message
fn message(err: impl std::fmt::Display) -> Failure {
    Failure::Message(err.to_string())
}

/// Serialize a live connection to bytes (VACUUM INTO a scratch file)
fn export_bytes(conn: &Connection) -> Result<Vec<u8>> {
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let path = scratch.path().join("export.db");
    let path_str = path
        .to_str()
        .context("Scratch path is not valid UTF-8")?
        .to_string();

    conn.execute("VACUUM INTO ?1", [path_str])
        .context("Failed to serialize database")?;

    let bytes = fs::read(&path).context("Failed to read serialized database")?;
    Ok(bytes)
}

/// Import validation: the blob must contain the documents table
fn has_documents_table(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents')",
        [],
        |row| row.get(0),
    )
}

/// Replay a source database into a fresh destination: schema statements
/// in creation order (so foreign keys resolve), then every row of every
/// user table, all in one transaction.
fn replay_database(source: &Connection, dest: &mut Connection) -> Result<()> {
    let schema_sql: Vec<String> = source
        .prepare(
            "SELECT sql FROM sqlite_master
             WHERE name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
             ORDER BY rowid",
        )?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let tables: Vec<String> = source
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%'
             ORDER BY rowid",
        )?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let tx = dest.transaction()?;

    for sql in &schema_sql {
        tx.execute_batch(sql)
            .with_context(|| format!("Failed to replay schema statement: {}", sql))?;
    }

    for table in &tables {
        let mut stmt = source.prepare(&format!("SELECT * FROM \"{}\"", table))?;
        let column_count = stmt.column_count();
        let placeholders: Vec<String> = (1..=column_count).map(|i| format!("?{}", i)).collect();
        let insert_sql = format!(
            "INSERT INTO \"{}\" VALUES ({})",
            table,
            placeholders.join(", ")
        );

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values: Vec<rusqlite::types::Value> = (0..column_count)
                .map(|i| row.get_ref(i).map(Into::into))
                .collect::<rusqlite::Result<_>>()?;
            tx.execute(&insert_sql, params_from_iter(values))
                .with_context(|| format!("Failed to copy a row into {}", table))?;
        }
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(host: &mut Host, request: Request) -> std::result::Result<Payload, Failure> {
        host.handle(request)
    }

    fn test_host() -> (Host, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let host = Host {
            config: Config::with_data_dir(dir.path()),
            state: None,
        };
        (host, dir)
    }

    #[test]
    fn operations_fail_fast_before_init() {
        let (mut host, _dir) = test_host();
        let result = apply(
            &mut host,
            Request::Query {
                sql: "SELECT 1".to_string(),
                params: vec![],
            },
        );
        assert!(matches!(result, Err(Failure::NotInitialized)));
    }

    #[test]
    fn init_creates_schema_and_is_idempotent() {
        let (mut host, _dir) = test_host();
        let first = apply(&mut host, Request::Init).unwrap();
        assert!(matches!(
            first,
            Payload::Initialized {
                backend: Backend::Durable
            }
        ));

        // Second init reports the same backend without reopening
        let second = apply(&mut host, Request::Init).unwrap();
        assert!(matches!(second, Payload::Initialized { .. }));

        let rows = match apply(
            &mut host,
            Request::Query {
                sql: "SELECT name FROM sqlite_master WHERE type='table' AND name='documents'"
                    .to_string(),
                params: vec![],
            },
        )
        .unwrap()
        {
            Payload::Rows(rows) => rows,
            other => panic!("unexpected payload: {:?}", other),
        };
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn exec_reports_last_insert_id() {
        let (mut host, _dir) = test_host();
        apply(&mut host, Request::Init).unwrap();

        let outcome = match apply(
            &mut host,
            Request::Exec {
                sql: "INSERT INTO documents (title, created_at, updated_at) VALUES (?1, 0, 0)"
                    .to_string(),
                params: vec![Value::from("First")],
            },
        )
        .unwrap()
        {
            Payload::ExecDone(outcome) => outcome,
            other => panic!("unexpected payload: {:?}", other),
        };

        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, 1);
    }

    #[test]
    fn sql_errors_become_failures_not_panics() {
        let (mut host, _dir) = test_host();
        apply(&mut host, Request::Init).unwrap();

        let result = apply(
            &mut host,
            Request::Exec {
                sql: "INSERT INTO no_such_table VALUES (1)".to_string(),
                params: vec![],
            },
        );
        assert!(matches!(result, Err(Failure::Message(_))));

        // Host keeps serving after a failure
        assert!(apply(
            &mut host,
            Request::Query {
                sql: "SELECT 1 AS one".to_string(),
                params: vec![],
            }
        )
        .is_ok());
    }

    #[test]
    fn close_releases_the_handle() {
        let (mut host, _dir) = test_host();
        apply(&mut host, Request::Init).unwrap();
        apply(&mut host, Request::Close).unwrap();

        let result = apply(
            &mut host,
            Request::Exec {
                sql: "SELECT 1".to_string(),
                params: vec![],
            },
        );
        assert!(matches!(result, Err(Failure::NotInitialized)));
    }

    fn exec(host: &mut Host, sql: &str) {
        apply(
            host,
            Request::Exec {
                sql: sql.to_string(),
                params: vec![],
            },
        )
        .unwrap();
    }

    fn query_rows(host: &mut Host, sql: &str) -> Vec<Row> {
        match apply(
            host,
            Request::Query {
                sql: sql.to_string(),
                params: vec![],
            },
        )
        .unwrap()
        {
            Payload::Rows(rows) => rows,
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn export_import_round_trips_rows() {
        let (mut host, _dir) = test_host();
        apply(&mut host, Request::Init).unwrap();
        exec(
            &mut host,
            "INSERT INTO documents (title, created_at, updated_at) VALUES ('Kept', 1, 2)",
        );
        exec(
            &mut host,
            "INSERT INTO words (headword, headword_norm, document_id, created_at)
             VALUES ('Kept!', 'kept', 1, 3)",
        );
        exec(
            &mut host,
            "INSERT INTO word_overrides (word_id, custom_definition, notes, updated_at)
             VALUES (1, 'my gloss', 'ch. 3', 4)",
        );
        exec(
            &mut host,
            "INSERT INTO document_stats (document_id, snippet, word_count, vocab_count, computed_at)
             VALUES (1, 'Kept', 1, 1, 5)",
        );

        let bytes = match apply(&mut host, Request::Export).unwrap() {
            Payload::Exported(bytes) => bytes,
            other => panic!("unexpected payload: {:?}", other),
        };
        assert!(!bytes.is_empty());

        // Import into a second, fresh host
        let (mut target, _dir2) = test_host();
        apply(&mut target, Request::Init).unwrap();
        let imported = apply(&mut target, Request::Import { data: bytes }).unwrap();
        assert!(matches!(imported, Payload::Imported { .. }));

        let docs = query_rows(&mut target, "SELECT title, created_at, updated_at FROM documents");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text("title").unwrap(), "Kept");
        assert_eq!(docs[0].i64("created_at").unwrap(), 1);
        assert_eq!(docs[0].i64("updated_at").unwrap(), 2);

        let words = query_rows(
            &mut target,
            "SELECT id, headword, headword_norm, document_id, created_at FROM words",
        );
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].i64("id").unwrap(), 1);
        assert_eq!(words[0].text("headword").unwrap(), "Kept!");
        assert_eq!(words[0].text("headword_norm").unwrap(), "kept");
        assert_eq!(words[0].i64("document_id").unwrap(), 1);
        assert_eq!(words[0].i64("created_at").unwrap(), 3);

        let overrides = query_rows(
            &mut target,
            "SELECT word_id, custom_definition, custom_phonetic, notes, updated_at
             FROM word_overrides",
        );
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].i64("word_id").unwrap(), 1);
        assert_eq!(overrides[0].text("custom_definition").unwrap(), "my gloss");
        assert_eq!(overrides[0].opt_text("custom_phonetic").unwrap(), None);
        assert_eq!(overrides[0].text("notes").unwrap(), "ch. 3");
        assert_eq!(overrides[0].i64("updated_at").unwrap(), 4);

        let stats = query_rows(
            &mut target,
            "SELECT document_id, snippet, word_count, vocab_count, computed_at
             FROM document_stats",
        );
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].i64("document_id").unwrap(), 1);
        assert_eq!(stats[0].text("snippet").unwrap(), "Kept");
        assert_eq!(stats[0].i64("word_count").unwrap(), 1);
        assert_eq!(stats[0].i64("vocab_count").unwrap(), 1);
        assert_eq!(stats[0].i64("computed_at").unwrap(), 5);
    }

    #[test]
    fn failed_import_replay_preserves_previous_database() {
        // A blob that passes validation but cannot be replayed: a
        // trigger calling an unknown function fires during the row copy
        let dir = tempfile::tempdir().unwrap();
        let broken_path = dir.path().join("broken.db");
        {
            let conn = Connection::open(&broken_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE documents (id INTEGER PRIMARY KEY, title TEXT,
                     created_at INTEGER, updated_at INTEGER);
                 CREATE TABLE extras (x INTEGER);
                 INSERT INTO extras VALUES (1);
                 CREATE TRIGGER extras_boom AFTER INSERT ON extras
                 BEGIN SELECT no_such_fn(new.x); END;",
            )
            .unwrap();
        }
        let broken = fs::read(&broken_path).unwrap();

        let (mut host, _dir) = test_host();
        apply(&mut host, Request::Init).unwrap();
        exec(
            &mut host,
            "INSERT INTO documents (title, created_at, updated_at) VALUES ('Survivor', 0, 0)",
        );

        let result = apply(&mut host, Request::Import { data: broken });
        assert!(matches!(result, Err(Failure::Message(_))));

        // The previous database file is intact; a fresh init sees it
        apply(&mut host, Request::Init).unwrap();
        let rows = query_rows(&mut host, "SELECT title FROM documents");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("title").unwrap(), "Survivor");
    }

    #[test]
    fn import_rejects_blob_without_documents_table() {
        // Build a valid SQLite file that lacks the expected schema
        let dir = tempfile::tempdir().unwrap();
        let bogus_path = dir.path().join("bogus.db");
        {
            let conn = Connection::open(&bogus_path).unwrap();
            conn.execute_batch("CREATE TABLE unrelated (x INTEGER); VACUUM;")
                .unwrap();
        }
        let bogus = fs::read(&bogus_path).unwrap();

        let (mut host, _dir) = test_host();
        apply(&mut host, Request::Init).unwrap();
        apply(
            &mut host,
            Request::Exec {
                sql: "INSERT INTO documents (title, created_at, updated_at) VALUES ('Safe', 0, 0)"
                    .to_string(),
                params: vec![],
            },
        )
        .unwrap();

        let result = apply(&mut host, Request::Import { data: bogus });
        assert!(matches!(result, Err(Failure::InvalidImport(_))));

        // Original data untouched after a rejected import
        let rows = match apply(
            &mut host,
            Request::Query {
                sql: "SELECT title FROM documents".to_string(),
                params: vec![],
            },
        )
        .unwrap()
        {
            Payload::Rows(rows) => rows,
            other => panic!("unexpected payload: {:?}", other),
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("title").unwrap(), "Safe");
    }
}
