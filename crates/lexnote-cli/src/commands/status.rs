//! Status command handler

use anyhow::Result;

use lexnote_core::{Backend, Config, Store, SCHEMA_VERSION};

use crate::output::{Output, OutputFormat};

/// Show database location, backend, and row counts
pub async fn show(store: &Store, config: &Config, backend: Backend, output: &Output) -> Result<()> {
    let documents = count(store, "documents").await?;
    let words = count(store, "words").await?;
    let entries = count(store, "dictionary_entries").await?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database": config.sqlite_path().display().to_string(),
                    "backend": backend.to_string(),
                    "schema_version": SCHEMA_VERSION,
                    "documents": documents,
                    "words": words,
                    "dictionary_entries": entries
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", documents);
        }
        OutputFormat::Human => {
            println!("Database:      {}", config.sqlite_path().display());
            println!("Backend:       {}", backend);
            println!("Schema:        v{}", SCHEMA_VERSION);
            println!();
            println!("Documents:     {}", documents);
            println!("Words:         {}", words);
            println!("Cached words:  {}", entries);
        }
    }

    Ok(())
}

async fn count(store: &Store, table: &str) -> Result<i64> {
    let rows = store
        .client()
        .query(format!("SELECT COUNT(*) AS n FROM {}", table), vec![])
        .await?;
    Ok(rows.first().map(|row| row.i64("n")).transpose()?.unwrap_or(0))
}
