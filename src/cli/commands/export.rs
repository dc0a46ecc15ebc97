//! Export command implementation.
//!
//! Streams every distinct command, newest first, one per line. Output is
//! meant to be piped into a fuzzy finder, so a reader that goes away early
//! ends the export quietly.

use crate::cli::commands::Globals;
use crate::error::{Error, Result};
use serde::Serialize;
use std::io::{self, BufWriter, Write};

#[derive(Serialize)]
struct ExportLine<'a> {
    id: i64,
    command: &'a str,
}

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the query fails or stdout fails for a reason other
/// than a closed pipe.
pub fn execute(with_id: bool, globals: &Globals<'_>) -> Result<()> {
    let store = globals.open_store()?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let result = store
        .for_each_unique(|id, text| {
            if globals.json {
                serde_json::to_writer(&mut out, &ExportLine { id, command: text })?;
                writeln!(out)?;
            } else if with_id {
                writeln!(out, "{id}\t{text}")?;
            } else {
                writeln!(out, "{text}")?;
            }
            Ok(())
        })
        .and_then(|()| out.flush().map_err(Error::from));

    match result {
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}
