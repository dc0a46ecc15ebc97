//! Session command implementations.

use crate::cli::commands::Globals;
use crate::cli::SessionCommands;
use crate::config::require_session;
use crate::error::{Error, Result};
use crate::model::SessionState;
use serde::Serialize;

#[derive(Serialize)]
struct SessionStatusOutput {
    app: String,
    pid: i64,
    state: SessionState,
}

#[derive(Serialize)]
struct SessionCloseOutput {
    pid: i64,
    closed: usize,
}

/// Execute session commands.
///
/// # Errors
///
/// Returns an error if the session identity is incomplete or the database
/// operation fails.
pub fn execute(command: &SessionCommands, globals: &Globals<'_>) -> Result<()> {
    match command {
        SessionCommands::Status => status(globals),
        SessionCommands::Close { pid } => close(pid.or(globals.pid), globals),
    }
}

fn status(globals: &Globals<'_>) -> Result<()> {
    let session = require_session(globals.app, globals.pid)?;
    let store = globals.open_store()?;
    let state = store.session_state(&session)?;

    if globals.json {
        let output = SessionStatusOutput {
            app: session.app,
            pid: session.pid,
            state,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{session}: {}", state.as_str());
    }
    Ok(())
}

fn close(pid: Option<i64>, globals: &Globals<'_>) -> Result<()> {
    let pid = pid.ok_or_else(|| {
        Error::MissingSessionIdentity("session close needs a pid (argument or --pid)".to_string())
    })?;
    let mut store = globals.open_store()?;
    let closed = store.close_session(pid)?;

    if globals.json {
        println!("{}", serde_json::to_string(&SessionCloseOutput { pid, closed })?);
    } else if closed == 0 {
        println!("No active session for pid {pid}");
    } else {
        println!("Closed {closed} session(s) for pid {pid}");
    }
    Ok(())
}
