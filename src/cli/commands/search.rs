//! Search command implementation.
//!
//! Prints only the command text so shell widgets can splice it into the
//! prompt. A miss prints nothing and still succeeds.

use crate::cli::commands::Globals;
use crate::cli::SearchArgs;
use crate::config::current_directory;
use crate::error::Result;
use crate::history::PrefixQuery;

/// Execute the search command.
///
/// # Errors
///
/// Returns an error if the database is missing or a scope query fails.
pub fn execute(args: &SearchArgs, globals: &Globals<'_>) -> Result<()> {
    let working_directory = if args.no_cwd {
        None
    } else {
        match &args.cwd {
            Some(cwd) => Some(cwd.clone()),
            None => Some(current_directory()?),
        }
    };

    let query = PrefixQuery {
        prefix: args.prefix.clone(),
        session: globals.session()?,
        working_directory,
        include_self: args.include_self,
    };

    let store = globals.open_store()?;
    let hit = store.find_latest(&query)?;

    if globals.json {
        println!("{}", serde_json::to_string(&hit)?);
    } else if let Some(hit) = hit {
        println!("{}", hit.record.command);
    }
    Ok(())
}
