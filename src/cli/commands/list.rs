//! List command implementation.

use crate::cli::commands::{print_command_line, Globals};
use crate::cli::{DedupArg, ListArgs};
use crate::config::require_session;
use crate::error::Result;
use crate::history::{DedupStrategy, RangeQuery};
use crate::model::CommandRecord;
use serde::Serialize;

#[derive(Serialize)]
struct ListOutput<'a> {
    commands: &'a [CommandRecord],
    count: usize,
}

impl From<DedupArg> for DedupStrategy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::Flag => Self::Flag,
            DedupArg::Aggregate => Self::Aggregate,
        }
    }
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if `--session` is given without a session identity, or
/// a query fails.
pub fn execute(args: &ListArgs, globals: &Globals<'_>) -> Result<()> {
    let mut query = RangeQuery::new(args.first, args.last).with_strategy(args.dedup.into());
    if let Some(pattern) = &args.pattern {
        query = query.with_pattern(pattern);
    }
    if args.session {
        query = query.with_session(require_session(globals.app, globals.pid)?);
    }

    let store = globals.open_store()?;
    let commands = store.range_unique(&query)?;

    if globals.json {
        let output = ListOutput {
            commands: &commands,
            count: commands.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        for record in &commands {
            print_command_line(record, None);
        }
    }
    Ok(())
}
