//! Record command implementation.
//!
//! Called from the shell's post-command hook. Creates the database on first
//! use so a fresh install starts recording without a separate `hist init`.

use crate::cli::commands::Globals;
use crate::cli::RecordArgs;
use crate::config::{current_directory, current_git_context};
use crate::error::{Error, Result};
use crate::model::NewCommand;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct RecordOutput {
    id: i64,
}

/// Execute the record command.
///
/// # Errors
///
/// Returns an error for blank command text, a partial session identity, or
/// a failed write.
pub fn execute(args: &RecordArgs, globals: &Globals<'_>) -> Result<()> {
    let text = args.command.join(" ");
    if text.trim().is_empty() {
        return Err(Error::InvalidArgument("command text is empty".to_string()));
    }

    let session = globals.session()?;
    let cwd = match &args.cwd {
        Some(cwd) => cwd.clone(),
        None => current_directory()?,
    };

    let mut cmd = NewCommand::new(text, cwd).with_exit_status(args.exit_status);
    if let Some(timestamp) = args.timestamp {
        cmd = cmd.with_timestamp(timestamp);
    }
    if let Some(duration_ms) = args.duration_ms {
        cmd = cmd.with_duration_ms(duration_ms);
    }
    if !args.no_git {
        if let Some(git) = current_git_context() {
            cmd = cmd.with_git(git);
        }
    }
    if let Some(session) = session {
        cmd = cmd.with_session(session);
    }

    let mut store = globals.open_or_create_store()?;
    let id = store.insert_command(&cmd)?;
    debug!(id, "Recorded command");

    if globals.json {
        println!("{}", serde_json::to_string(&RecordOutput { id })?);
    }
    Ok(())
}
