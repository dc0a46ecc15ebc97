//! SQLite storage implementation.
//!
//! `HistoryStore` owns one connection to the history database. Opening it
//! runs the schema migrations, so every query below sees the latest layout.
//! Writes go through [`HistoryStore::write`], which takes the write lock with
//! bounded retry and commits or rolls back as a unit.

use crate::error::{Error, Result};
use crate::model::{CommandRecord, GitContext, NewCommand, SessionId, SessionState, SourceRef};
use crate::storage::migrations::{run_migrations, schema_version, LATEST_VERSION};
use crate::storage::retry::{begin_immediate, RetryPolicy};
use crate::storage::schema::{apply_pragmas, COMMAND_SELECT};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, ToSql, Transaction};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default busy-wait ceiling for a single lock acquisition.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed command history.
#[derive(Debug)]
pub struct HistoryStore {
    conn: Connection,
    path: Option<PathBuf>,
    busy_timeout: Duration,
    retry: RetryPolicy,
}

/// Row counts and version information for `hist status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub schema_version: u32,
    pub latest_version: u32,
    pub commands: i64,
    pub unique_commands: i64,
    pub directories: i64,
    pub git_contexts: i64,
    pub active_sessions: i64,
    pub closed_sessions: i64,
}

impl HistoryStore {
    /// Open a database at the given path.
    ///
    /// Creates the database if it doesn't exist and migrates it to the
    /// latest schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let busy_timeout = timeout_ms.map_or(DEFAULT_BUSY_TIMEOUT, Duration::from_millis);
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
            busy_timeout,
            retry: RetryPolicy::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            retry: RetryPolicy::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        apply_pragmas(&self.conn)?;
        let before = run_migrations(&self.conn, &self.retry)?;
        debug!(from = before, to = LATEST_VERSION, "Store ready");
        Ok(())
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Database file path; `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open an extra read-only connection to the same file.
    ///
    /// Returns `None` for in-memory stores, which cannot be shared.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_reader(&self) -> Result<Option<Connection>> {
        self.path
            .as_deref()
            .map(|path| open_reader(path, self.busy_timeout))
            .transpose()
    }

    /// Busy-wait ceiling configured for this store.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Current persisted schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<u32> {
        schema_version(&self.conn)
    }

    /// Run a write inside an IMMEDIATE transaction.
    ///
    /// The closure's error rolls the whole transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if the write lock cannot be acquired within
    /// the retry budget, or any error from the closure or the commit.
    pub fn write<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R>,
    {
        let tx = begin_immediate(&self.conn, &self.retry)?;
        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, "Write committed");
        Ok(result)
    }

    // ==================
    // Command Operations
    // ==================

    /// Record a command and return its identifier.
    ///
    /// The working directory, git context and session rows are created on
    /// first use. Every older row with the same text is flagged duplicate in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn insert_command(&mut self, cmd: &NewCommand) -> Result<i64> {
        self.write("insert_command", |tx| {
            let place_id = get_or_create_place(tx, &cmd.working_directory)?;
            let context_id = match &cmd.git {
                Some(git) => get_or_create_context(tx, git)?,
                None => None,
            };
            let source_id = cmd
                .session
                .as_ref()
                .map(|session| get_or_create_source(tx, session))
                .transpose()?;

            tx.execute(
                "INSERT INTO commands (timestamp, exit_status, command, place_id, context_id, source_id, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    cmd.timestamp,
                    cmd.exit_status,
                    cmd.command,
                    place_id,
                    context_id,
                    source_id,
                    cmd.duration_ms,
                ],
            )?;
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE commands SET is_duplicate = 1
                 WHERE command = ?1 AND id < ?2 AND is_duplicate = 0",
                rusqlite::params![cmd.command, id],
            )?;

            Ok(id)
        })
    }

    /// Look up a single command by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandNotFound`] if no row has this identifier.
    pub fn get_command(&self, id: i64) -> Result<CommandRecord> {
        let sql = format!("{COMMAND_SELECT} WHERE c.id = ?1");
        self.conn
            .query_row(&sql, [id], map_command_row)
            .optional()?
            .ok_or(Error::CommandNotFound { id })
    }

    /// Highest identifier in the store, or `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn max_command_id(&self) -> Result<Option<i64>> {
        max_command_id(&self.conn)
    }

    /// Get or create the working-directory row for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn get_or_create_place(&mut self, path: &str) -> Result<i64> {
        self.write("get_or_create_place", |tx| get_or_create_place(tx, path))
    }

    // ==================
    // Session Registry
    // ==================

    /// Lifecycle state of a session identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn session_state(&self, session: &SessionId) -> Result<SessionState> {
        let (active, closed): (i64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(active = 1), 0), COALESCE(SUM(active = 0), 0)
             FROM sources WHERE app = ?1 AND pid = ?2",
            rusqlite::params![session.app, session.pid],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(if active > 0 {
            SessionState::Active
        } else if closed > 0 {
            SessionState::Closed
        } else {
            SessionState::Unknown
        })
    }

    /// Whether `session` currently has an active row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_session_active(&self, session: &SessionId) -> Result<bool> {
        Ok(self.session_state(session)? == SessionState::Active)
    }

    /// Close every active session row for `pid`, across applications.
    ///
    /// When a closed row for the same (app, pid) already exists (the pid was
    /// closed before and then reused), the active row's commands are moved
    /// onto it and the active row is removed, since (app, pid, active) is
    /// unique. Returns the number of sessions closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn close_session(&mut self, pid: i64) -> Result<usize> {
        self.write("close_session", |tx| {
            let active: Vec<(i64, String)> = tx
                .prepare("SELECT id, app FROM sources WHERE pid = ?1 AND active = 1")?
                .query_map([pid], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;

            for (source_id, app) in &active {
                let closed_id: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM sources WHERE app = ?1 AND pid = ?2 AND active = 0",
                        rusqlite::params![app, pid],
                        |row| row.get(0),
                    )
                    .optional()?;

                match closed_id {
                    None => {
                        tx.execute("UPDATE sources SET active = 0 WHERE id = ?1", [source_id])?;
                    }
                    Some(closed_id) => {
                        tx.execute(
                            "UPDATE commands SET source_id = ?1 WHERE source_id = ?2",
                            [closed_id, *source_id],
                        )?;
                        tx.execute("DELETE FROM sources WHERE id = ?1", [source_id])?;
                    }
                }
                debug!(app = %app, pid, "Session closed");
            }

            Ok(active.len())
        })
    }

    /// Summary counts for status output.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(StoreStats {
            schema_version: self.schema_version()?,
            latest_version: LATEST_VERSION,
            commands: count("SELECT COUNT(*) FROM commands")?,
            unique_commands: count("SELECT COUNT(*) FROM commands WHERE is_duplicate = 0")?,
            directories: count("SELECT COUNT(*) FROM places")?,
            git_contexts: count("SELECT COUNT(*) FROM contexts")?,
            active_sessions: count("SELECT COUNT(*) FROM sources WHERE active = 1")?,
            closed_sessions: count("SELECT COUNT(*) FROM sources WHERE active = 0")?,
        })
    }
}

/// Open a read-only connection for concurrent scope queries.
pub(crate) fn open_reader(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "case_sensitive_like", "ON")?;
    Ok(conn)
}

/// Highest command id visible to `conn`.
pub(crate) fn max_command_id(conn: &Connection) -> Result<Option<i64>> {
    Ok(conn.query_row("SELECT MAX(id) FROM commands", [], |row| row.get(0))?)
}

/// Map a row selected with [`COMMAND_SELECT`].
pub(crate) fn map_command_row(row: &Row<'_>) -> rusqlite::Result<CommandRecord> {
    let app: Option<String> = row.get(8)?;
    let pid: Option<i64> = row.get(9)?;
    let active: Option<bool> = row.get(10)?;
    let source = match (app, pid, active) {
        (Some(app), Some(pid), Some(active)) => Some(SourceRef { app, pid, active }),
        _ => None,
    };

    Ok(CommandRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        exit_status: row.get(2)?,
        command: row.get(3)?,
        working_directory: row.get(4)?,
        git_remote: row.get(5)?,
        git_branch: row.get(6)?,
        duration_ms: row.get(7)?,
        source,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Insert a dimension row, or return the existing one's id.
///
/// A unique-constraint failure means another writer created the row first;
/// it is answered by re-reading, never surfaced.
fn insert_or_lookup(
    conn: &Connection,
    insert_sql: &str,
    lookup_sql: &str,
    params: &[&dyn ToSql],
) -> Result<i64> {
    match conn.execute(insert_sql, params) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_constraint_violation(&e) => {
            Ok(conn.query_row(lookup_sql, params, |row| row.get(0))?)
        }
        Err(e) => Err(e.into()),
    }
}

fn get_or_create_place(conn: &Connection, path: &str) -> Result<i64> {
    insert_or_lookup(
        conn,
        "INSERT INTO places (path) VALUES (?1)",
        "SELECT id FROM places WHERE path = ?1",
        rusqlite::params![path],
    )
}

/// Returns `None` when the context carries neither remote nor branch.
fn get_or_create_context(conn: &Connection, git: &GitContext) -> Result<Option<i64>> {
    let remote = git.remote.as_deref().filter(|s| !s.is_empty());
    let branch = git.branch.as_deref().filter(|s| !s.is_empty());
    if remote.is_none() && branch.is_none() {
        return Ok(None);
    }

    insert_or_lookup(
        conn,
        "INSERT INTO contexts (remote, branch) VALUES (?1, ?2)",
        "SELECT id FROM contexts WHERE remote IS ?1 AND branch IS ?2",
        rusqlite::params![remote, branch],
    )
    .map(Some)
}

fn get_or_create_source(conn: &Connection, session: &SessionId) -> Result<i64> {
    insert_or_lookup(
        conn,
        "INSERT INTO sources (app, pid, active) VALUES (?1, ?2, 1)",
        "SELECT id FROM sources WHERE app = ?1 AND pid = ?2 AND active = 1",
        rusqlite::params![session.app, session.pid],
    )
}
