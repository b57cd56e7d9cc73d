//! Database export and import

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use lexnote_core::Store;

use crate::output::Output;
use crate::prompt::confirm;

/// File extensions accepted for import
const IMPORT_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

fn check_import_extension(path: &Path) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !IMPORT_EXTENSIONS
        .iter()
        .any(|accepted| ext.eq_ignore_ascii_case(accepted))
    {
        bail!(
            "Unsupported import file {:?}: expected a .db, .sqlite or .sqlite3 file",
            path
        );
    }
    Ok(())
}

/// Export the whole database to a file
pub async fn export(store: &Store, path: PathBuf, output: &Output) -> Result<()> {
    let bytes = store.client().export().await?;
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write export file: {:?}", path))?;

    output.success(&format!(
        "Exported {} bytes to {}",
        bytes.len(),
        path.display()
    ));
    Ok(())
}

/// Replace the database with a previously exported file
pub async fn import(store: &Store, path: PathBuf, yes: bool, output: &Output) -> Result<()> {
    check_import_extension(&path)?;
    let bytes = std::fs::read(&path)
        .with_context(|| format!("Failed to read import file: {:?}", path))?;

    if !yes && output.should_prompt() {
        println!("Import {} ({} bytes)", path.display(), bytes.len());
        println!("This replaces ALL current documents and words.");
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    // Validation happens before any current data is touched, so a bad
    // file leaves the database as it was
    let backend = store.client().import(bytes).await?;

    output.success(&format!(
        "Imported {} (storage: {})",
        path.display(),
        backend
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_extension_accepts_database_files() {
        for name in ["backup.db", "backup.sqlite", "backup.sqlite3", "BACKUP.DB"] {
            assert!(check_import_extension(Path::new(name)).is_ok(), "{}", name);
        }
    }

    #[test]
    fn import_extension_rejects_other_files() {
        for name in ["notes.txt", "backup.db.gz", "database", "archive.zip"] {
            assert!(check_import_extension(Path::new(name)).is_err(), "{}", name);
        }
    }
}
