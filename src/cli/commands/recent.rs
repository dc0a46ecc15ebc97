//! Recent command implementation.

use crate::cli::commands::{print_command_line, Globals};
use crate::cli::RecentArgs;
use crate::config::{current_directory, require_session};
use crate::error::Result;
use crate::history::{RankedCommand, RecentQuery, Window};
use serde::Serialize;

#[derive(Serialize)]
struct RecentOutput<'a> {
    commands: &'a [RankedCommand],
    count: usize,
}

/// Execute the recent command.
///
/// # Errors
///
/// Returns [`crate::Error::MissingSessionIdentity`] without `--app`/`--pid`,
/// or an error if a query fails.
pub fn execute(args: &RecentArgs, globals: &Globals<'_>) -> Result<()> {
    let session = require_session(globals.app, globals.pid)?;
    let window = match args.offset {
        Some(offset) => Window::Offset(offset),
        None => Window::Limit(args.limit),
    };
    let cwd = match &args.cwd {
        Some(cwd) => cwd.clone(),
        None => current_directory()?,
    };

    let mut query = RecentQuery::new(session, window).in_directory(cwd);
    query.include_self = args.include_self;
    if let Some(prefix) = &args.prefix {
        query = query.with_prefix(prefix);
    }

    let store = globals.open_store()?;
    let commands = store.recent_unique(&query)?;

    if globals.json {
        let output = RecentOutput {
            commands: &commands,
            count: commands.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if let Window::Offset(_) = window {
        if let Some(entry) = commands.first() {
            println!("{}", entry.record.command);
        }
    } else {
        for entry in &commands {
            print_command_line(&entry.record, Some(entry.scope.as_str()));
        }
    }
    Ok(())
}
