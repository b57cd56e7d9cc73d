//! SQLite schema and migration runner
//!
//! Tables are created in dependency order so an import replay can
//! recreate them with foreign keys resolving. Migrations are applied
//! once, in order, guarded by a version key in the `meta` table; every
//! statement also uses IF NOT EXISTS so re-entrant startup (e.g. right
//! after an import brought the schema along) is safe.

use rusqlite::{Connection, OptionalExtension, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Key under which the schema version is recorded in `meta`
const VERSION_KEY: &str = "schema_version";

/// The `meta` key/value table; created unconditionally so the version
/// check below always has somewhere to look
const META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// One ordered migration step
struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: r#"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL DEFAULT 'Untitled',
        content_json TEXT NOT NULL DEFAULT '{"type":"doc","content":[{"type":"paragraph"}]}',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS words (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        headword TEXT NOT NULL,
        headword_norm TEXT NOT NULL,
        document_id INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id)
    );

    CREATE INDEX IF NOT EXISTS idx_words_document ON words(document_id);
    CREATE INDEX IF NOT EXISTS idx_words_norm ON words(headword_norm);

    CREATE TABLE IF NOT EXISTS dictionary_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        headword_norm TEXT NOT NULL UNIQUE,
        phonetic TEXT,
        audio_url TEXT,
        part_of_speech TEXT,
        definition TEXT,
        synonyms TEXT NOT NULL DEFAULT '[]',
        fetched_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS word_overrides (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        word_id INTEGER NOT NULL,
        custom_definition TEXT,
        custom_phonetic TEXT,
        notes TEXT,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY (word_id) REFERENCES words(id)
    );

    CREATE INDEX IF NOT EXISTS idx_word_overrides_word ON word_overrides(word_id);

    CREATE TABLE IF NOT EXISTS document_stats (
        document_id INTEGER PRIMARY KEY,
        snippet TEXT NOT NULL DEFAULT '',
        word_count INTEGER NOT NULL DEFAULT 0,
        vocab_count INTEGER NOT NULL DEFAULT 0,
        computed_at INTEGER NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id)
    );
    "#,
}];

/// Apply all pending migrations
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(META_TABLE)?;

    let current = schema_version(conn)?;
    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.sql)?;
            set_schema_version(conn, migration.version)?;
        }
    }

    Ok(())
}

/// Read the recorded schema version (0 when unset)
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        rusqlite::params![VERSION_KEY, version.to_string()],
    )?;
    Ok(())
}

/// Whether the schema still needs migrations
pub fn needs_migration(conn: &Connection) -> bool {
    schema_version(conn).map(|v| v < SCHEMA_VERSION).unwrap_or(true)
}
