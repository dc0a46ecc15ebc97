//! Command implementations.

pub mod completions;
pub mod export;
pub mod init;
pub mod list;
pub mod recent;
pub mod record;
pub mod search;
pub mod session;
pub mod show;
pub mod status;
pub mod version;

use crate::cli::Cli;
use crate::config::{resolve_db_path, resolve_session};
use crate::error::{Error, Result};
use crate::model::{CommandRecord, SessionId};
use crate::storage::HistoryStore;
use chrono::{Local, TimeZone};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Global flags every handler needs.
#[derive(Debug, Clone)]
pub struct Globals<'a> {
    pub db: Option<&'a Path>,
    pub app: Option<&'a str>,
    pub pid: Option<i64>,
    pub busy_timeout_ms: u64,
    pub json: bool,
}

impl<'a> Globals<'a> {
    #[must_use]
    pub fn from_cli(cli: &'a Cli, json: bool) -> Self {
        Self {
            db: cli.db.as_deref(),
            app: cli.app.as_deref(),
            pid: cli.pid,
            busy_timeout_ms: cli.busy_timeout_ms,
            json,
        }
    }

    /// Resolved database path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no home directory can be found.
    pub fn db_path(&self) -> Result<PathBuf> {
        resolve_db_path(self.db)
            .ok_or_else(|| Error::Config("Could not determine the hist data directory".to_string()))
    }

    /// Open an existing database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the database file is missing.
    pub fn open_store(&self) -> Result<HistoryStore> {
        let db_path = self.db_path()?;
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        HistoryStore::open_with_timeout(&db_path, Some(self.busy_timeout_ms))
    }

    /// Open the database, creating it and its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open_or_create_store(&self) -> Result<HistoryStore> {
        let db_path = self.db_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        HistoryStore::open_with_timeout(&db_path, Some(self.busy_timeout_ms))
    }

    /// Session from `--app` / `--pid`, if given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSessionIdentity`] for a partial identity.
    pub fn session(&self) -> Result<Option<SessionId>> {
        resolve_session(self.app, self.pid)
    }
}

/// Local time for a stored epoch timestamp.
pub(crate) fn format_timestamp(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map_or_else(|| timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// One history line: id, optional tag, command text.
pub(crate) fn print_command_line(record: &CommandRecord, tag: Option<&str>) {
    let id = format!("{:>6}", record.id).dimmed();
    let status = if record.exit_status == 0 {
        String::new()
    } else {
        format!(" [{}]", record.exit_status).red().to_string()
    };
    match tag {
        Some(tag) => println!("{id}  {}  {}{status}", format!("{tag:<9}").cyan(), record.command),
        None => println!("{id}  {}{status}", record.command),
    }
}
