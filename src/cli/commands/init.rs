//! Create or upgrade the history database.
//!
//! Opening the store applies any pending migrations, so `hist init` on an
//! existing database is an explicit upgrade and otherwise a no-op.

use crate::cli::commands::Globals;
use crate::error::Result;
use crate::storage::LATEST_VERSION;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    created: bool,
    schema_version: u32,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created, or a
/// migration fails.
pub fn execute(globals: &Globals<'_>) -> Result<()> {
    let db_path = globals.db_path()?;
    let created = !db_path.exists();
    let store = globals.open_or_create_store()?;
    let schema_version = store.schema_version()?;

    if globals.json {
        let output = InitOutput {
            database: db_path,
            created,
            schema_version,
        };
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else if created {
        println!("Initialized hist database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: call `hist record` from your shell's command hook.");
    } else {
        println!("Database already initialized");
        println!("  Database: {}", db_path.display());
        println!("  Schema:   v{schema_version} (latest v{LATEST_VERSION})");
    }

    Ok(())
}
