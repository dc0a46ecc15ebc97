//! Status command implementation.

use crate::cli::commands::Globals;
use crate::config::current_git_branch;
use crate::error::Result;
use crate::model::SessionState;
use crate::storage::StoreStats;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    #[serde(flatten)]
    stats: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionInfo>,
    git_branch: Option<String>,
}

#[derive(Serialize)]
struct SessionInfo {
    app: String,
    pid: i64,
    state: SessionState,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database is missing or a query fails.
pub fn execute(globals: &Globals<'_>) -> Result<()> {
    let database = globals.db_path()?;
    let store = globals.open_store()?;
    let stats = store.stats()?;

    let session = match globals.session()? {
        Some(id) => {
            let state = store.session_state(&id)?;
            Some(SessionInfo {
                app: id.app,
                pid: id.pid,
                state,
            })
        }
        None => None,
    };
    let git_branch = current_git_branch();

    if globals.json {
        let output = StatusOutput {
            database,
            stats,
            session,
            git_branch,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "hist status".bold());
    println!("===========");
    println!();
    println!("Database: {}", database.display());
    let schema = format!("v{} (latest v{})", stats.schema_version, stats.latest_version);
    if stats.schema_version == stats.latest_version {
        println!("Schema:   {}", schema.green());
    } else {
        println!("Schema:   {}", schema.yellow());
    }
    if let Some(ref branch) = git_branch {
        println!("Branch:   {branch}");
    }
    println!();
    println!("Commands:      {}", stats.commands);
    println!("  Distinct:    {}", stats.unique_commands);
    println!("Directories:   {}", stats.directories);
    println!("Git contexts:  {}", stats.git_contexts);
    println!(
        "Sessions:      {} active, {} closed",
        stats.active_sessions, stats.closed_sessions
    );

    if let Some(s) = session {
        println!();
        println!("This session: {}:{} ({})", s.app, s.pid, s.state.as_str());
    }

    Ok(())
}
