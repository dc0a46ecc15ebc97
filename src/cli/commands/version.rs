//! Version command implementation.

use crate::error::Result;
use crate::storage::LATEST_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    schema_version: u32,
    build: &'static str,
}

/// Execute the version command.
///
/// Reports the crate version and the schema version this build migrates to.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        schema_version: LATEST_VERSION,
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "hist {} (schema v{}, {})",
            output.version, output.schema_version, output.build
        );
    }
    Ok(())
}
