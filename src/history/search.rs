//! Priority prefix search.
//!
//! Finds the single most recent command starting with a prefix, preferring
//! the narrowest scope that applies:
//!
//! ```text
//! session ──resolved, empty──────────────────────▶ global
//!    │
//!    └─unresolved──▶ directory ──empty/absent──▶ global
//! ```
//!
//! Directory scope is the fallback for callers without a live session, not
//! an extra step after an empty session scope.
//!
//! For file-backed stores the three scope queries run concurrently on
//! blocking workers, each with its own read-only connection, and report
//! through one-shot channels. The coordinator reads them in priority order
//! and drains every worker before returning. Callers already inside a tokio
//! runtime get the sequential path on the store's own connection.

use crate::error::{Error, Result};
use crate::history::scope::{session_resolvable, CommandFilter, Scope};
use crate::model::{CommandRecord, SessionId};
use crate::storage::sqlite::open_reader;
use crate::storage::HistoryStore;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Input for [`HistoryStore::find_latest`].
#[derive(Debug, Clone, Default)]
pub struct PrefixQuery {
    pub prefix: String,
    pub session: Option<SessionId>,
    pub working_directory: Option<String>,
    /// Also match invocations of this tool.
    pub include_self: bool,
}

/// The winning command and the scope that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub scope: Scope,
    #[serde(flatten)]
    pub record: CommandRecord,
}

/// What one scope query produced.
#[derive(Debug)]
enum ScopeRows {
    /// The scope had nothing to filter on (no live session, no directory).
    Unresolved,
    Rows(Vec<CommandRecord>),
}

/// Next move after looking at one scope's rows.
enum Step {
    Hit(SearchHit),
    Next(Scope),
    Exhausted,
}

fn step(scope: Scope, rows: ScopeRows) -> Step {
    let rows = match rows {
        ScopeRows::Rows(rows) => rows,
        ScopeRows::Unresolved => {
            return match scope {
                Scope::Session => Step::Next(Scope::Directory),
                Scope::Directory => Step::Next(Scope::Global),
                Scope::Global => Step::Exhausted,
            };
        }
    };

    match rows.into_iter().next() {
        Some(record) => Step::Hit(SearchHit { scope, record }),
        None if scope == Scope::Global => Step::Exhausted,
        None => Step::Next(Scope::Global),
    }
}

fn run_scope(conn: &Connection, scope: Scope, query: &PrefixQuery) -> Result<ScopeRows> {
    let filter = CommandFilter::new()
        .prefix(&query.prefix)
        .self_invocations(query.include_self);

    let filter = match scope {
        Scope::Session => {
            let Some(session) = &query.session else {
                return Ok(ScopeRows::Unresolved);
            };
            if !session_resolvable(conn, session)? {
                return Ok(ScopeRows::Unresolved);
            }
            let filter = filter.session(session);
            match &query.working_directory {
                Some(cwd) => filter.directory(cwd),
                None => filter,
            }
        }
        Scope::Directory => match &query.working_directory {
            Some(cwd) => filter.directory(cwd),
            None => return Ok(ScopeRows::Unresolved),
        },
        Scope::Global => filter,
    };

    filter.fetch_recent(conn, 1).map(ScopeRows::Rows)
}

const fn slot(scope: Scope) -> usize {
    match scope {
        Scope::Session => 0,
        Scope::Directory => 1,
        Scope::Global => 2,
    }
}

impl HistoryStore {
    /// Most recent command starting with `query.prefix`, narrowest scope first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSessionIdentity`] for a session without an app
    /// name, or an error if a scope query that decides the answer fails.
    pub fn find_latest(&self, query: &PrefixQuery) -> Result<Option<SearchHit>> {
        if query
            .session
            .as_ref()
            .is_some_and(|session| session.app.trim().is_empty())
        {
            return Err(Error::MissingSessionIdentity(
                "session search needs the session's application name".to_string(),
            ));
        }

        let Some(path) = self.path() else {
            return find_latest_sequential(self.conn(), query);
        };
        // Blocking on a nested runtime would panic.
        if tokio::runtime::Handle::try_current().is_ok() {
            debug!("Inside a runtime, searching scopes on one connection");
            return find_latest_sequential(self.conn(), query);
        }

        let rt = tokio::runtime::Builder::new_current_thread().build()?;
        rt.block_on(find_latest_concurrent(
            path.to_path_buf(),
            self.busy_timeout(),
            query.clone(),
        ))
    }
}

/// Single-connection path for in-memory stores.
fn find_latest_sequential(conn: &Connection, query: &PrefixQuery) -> Result<Option<SearchHit>> {
    let mut scope = Scope::Session;
    loop {
        match step(scope, run_scope(conn, scope, query)?) {
            Step::Hit(hit) => return Ok(Some(hit)),
            Step::Next(next) => scope = next,
            Step::Exhausted => return Ok(None),
        }
    }
}

type ScopeResult = Result<ScopeRows>;

async fn find_latest_concurrent(
    path: PathBuf,
    busy_timeout: Duration,
    query: PrefixQuery,
) -> Result<Option<SearchHit>> {
    let query = Arc::new(query);
    let mut receivers: [Option<oneshot::Receiver<ScopeResult>>; 3] = [None, None, None];
    let mut workers = Vec::with_capacity(3);

    for scope in [Scope::Session, Scope::Directory, Scope::Global] {
        let (tx, rx) = oneshot::channel();
        receivers[slot(scope)] = Some(rx);

        let path = path.clone();
        let query = Arc::clone(&query);
        workers.push(tokio::task::spawn_blocking(move || {
            let result = open_reader(&path, busy_timeout)
                .and_then(|conn| run_scope(&conn, scope, &query));
            // The coordinator drops receivers it no longer needs.
            let _ = tx.send(result);
        }));
    }

    let outcome = coordinate(&mut receivers).await;

    drop(receivers);
    for worker in workers {
        if let Err(e) = worker.await {
            debug!(error = %e, "Scope worker did not finish cleanly");
        }
    }

    outcome
}

async fn coordinate(
    receivers: &mut [Option<oneshot::Receiver<ScopeResult>>; 3],
) -> Result<Option<SearchHit>> {
    let mut scope = Scope::Session;
    loop {
        let rx = receivers[slot(scope)]
            .take()
            .ok_or_else(|| Error::Other(format!("{} scope read twice", scope.as_str())))?;
        let rows = rx
            .await
            .map_err(|_| Error::Other(format!("{} scope worker exited", scope.as_str())))??;

        match step(scope, rows) {
            Step::Hit(hit) => {
                debug!(scope = hit.scope.as_str(), id = hit.record.id, "Prefix search hit");
                return Ok(Some(hit));
            }
            Step::Next(next) => scope = next,
            Step::Exhausted => return Ok(None),
        }
    }
}
