//! Show command implementation.

use crate::cli::commands::{format_timestamp, Globals};
use crate::error::Result;
use colored::Colorize;

/// Execute the show command.
///
/// # Errors
///
/// Returns [`crate::Error::CommandNotFound`] for an unknown id.
pub fn execute(id: i64, globals: &Globals<'_>) -> Result<()> {
    let store = globals.open_store()?;
    let record = store.get_command(id)?;

    if globals.json {
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    println!("{}", record.command.bold());
    println!("  ID:        {}", record.id);
    println!("  Time:      {}", format_timestamp(record.timestamp));
    let status = record.exit_status.to_string();
    if record.exit_status == 0 {
        println!("  Exit:      {}", status.green());
    } else {
        println!("  Exit:      {}", status.red());
    }
    if let Some(ms) = record.duration_ms {
        println!("  Duration:  {ms} ms");
    }
    println!("  Directory: {}", record.working_directory);
    if let Some(ref remote) = record.git_remote {
        println!("  Remote:    {remote}");
    }
    if let Some(ref branch) = record.git_branch {
        println!("  Branch:    {branch}");
    }
    if let Some(ref source) = record.source {
        let state = if source.active { "active" } else { "closed" };
        println!("  Session:   {}:{} ({})", source.app, source.pid, state.dimmed());
    }
    Ok(())
}
