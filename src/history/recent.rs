//! Ranked recent commands without consecutive duplicates.
//!
//! Candidates come from session, directory and global scope *merged*: all of
//! the session's rows first, then the directory's, then everything else, each
//! newest first. Wider scopes exclude rows a narrower scope already covers,
//! so no row appears twice. A candidate is dropped only when its text equals
//! the candidate right before it; the same text may come back later in the
//! sequence.
//!
//! Each scope is read in pages of 3x the request (at least 50 rows) to absorb
//! the rows adjacency suppression removes. A scope is paged until it runs out
//! or the request is filled, and wider scopes are not queried at all once the
//! narrower ones fill it.

use crate::error::{Error, Result};
use crate::history::scope::{session_resolvable, CommandFilter, Scope};
use crate::model::{CommandRecord, SessionId};
use crate::storage::HistoryStore;
use serde::Serialize;
use tracing::debug;

/// Minimum rows fetched per scope.
const MIN_FETCH: usize = 50;

/// Rows fetched per requested row.
const OVERFETCH_FACTOR: usize = 3;

/// How much of the ranked sequence to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The first `n` entries.
    Limit(usize),
    /// Only the entry at this 0-based position.
    Offset(usize),
}

impl Window {
    const fn wanted(self) -> usize {
        match self {
            Self::Limit(n) => n,
            Self::Offset(i) => i.saturating_add(1),
        }
    }
}

/// Input for [`HistoryStore::recent_unique`].
#[derive(Debug, Clone)]
pub struct RecentQuery {
    /// Required; the session bucket is empty if it has no live rows.
    pub session: SessionId,
    pub working_directory: Option<String>,
    pub prefix: Option<String>,
    pub include_self: bool,
    pub window: Window,
}

impl RecentQuery {
    #[must_use]
    pub fn new(session: SessionId, window: Window) -> Self {
        Self {
            session,
            working_directory: None,
            prefix: None,
            include_self: false,
            window,
        }
    }

    #[must_use]
    pub fn in_directory(mut self, cwd: impl Into<String>) -> Self {
        self.working_directory = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// A ranked entry with the scope it came from.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCommand {
    pub scope: Scope,
    #[serde(flatten)]
    pub record: CommandRecord,
}

/// Merged sequence with adjacency suppression.
struct Ranked {
    entries: Vec<RankedCommand>,
    wanted: usize,
}

impl Ranked {
    fn new(wanted: usize) -> Self {
        Self {
            entries: Vec::with_capacity(wanted),
            wanted,
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.wanted
    }

    fn extend(&mut self, scope: Scope, rows: Vec<CommandRecord>) {
        for record in rows {
            if self.is_full() {
                return;
            }
            let repeats_previous = self
                .entries
                .last()
                .is_some_and(|prev| prev.record.command == record.command);
            if repeats_previous {
                continue;
            }
            self.entries.push(RankedCommand { scope, record });
        }
    }
}

impl HistoryStore {
    /// Page through one scope, newest first, until `ranked` is full or the
    /// scope runs out.
    ///
    /// Adjacency suppression can discard most of a page, so a full page is
    /// followed by the next one rather than handing over to a wider scope.
    fn fill_from(
        &self,
        ranked: &mut Ranked,
        scope: Scope,
        filter: CommandFilter,
        page_size: usize,
    ) -> Result<()> {
        let mut filter = filter;
        while !ranked.is_full() {
            let page = filter.fetch_recent(self.conn(), page_size)?;
            let Some(oldest) = page.last().map(|record| record.id) else {
                break;
            };
            let exhausted = page.len() < page_size;
            ranked.extend(scope, page);
            if exhausted {
                break;
            }
            debug!(scope = scope.as_str(), before = oldest, "Fetching next page");
            filter = filter.before_id(oldest);
        }
        Ok(())
    }

    /// Most recent commands across the three scopes, adjacent repeats removed.
    ///
    /// With [`Window::Offset`] the result holds at most the one entry at that
    /// position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSessionIdentity`] when the session has no app
    /// name, before any query runs.
    pub fn recent_unique(&self, query: &RecentQuery) -> Result<Vec<RankedCommand>> {
        if query.session.app.trim().is_empty() {
            return Err(Error::MissingSessionIdentity(
                "recent history needs the session's application name".to_string(),
            ));
        }

        let wanted = query.window.wanted();
        if wanted == 0 {
            return Ok(Vec::new());
        }
        let fetch = wanted.saturating_mul(OVERFETCH_FACTOR).max(MIN_FETCH);

        let base = {
            let filter = CommandFilter::new().self_invocations(query.include_self);
            match &query.prefix {
                Some(prefix) => filter.prefix(prefix),
                None => filter,
            }
        };
        let session = &query.session;
        let mut ranked = Ranked::new(wanted);

        if session_resolvable(self.conn(), session)? {
            self.fill_from(&mut ranked, Scope::Session, base.clone().session(session), fetch)?;
        } else {
            debug!(session = %session, "Session not active, empty session bucket");
        }

        if let Some(cwd) = &query.working_directory {
            let filter = base.clone().directory(cwd).not_session(session);
            self.fill_from(&mut ranked, Scope::Directory, filter, fetch)?;
        }

        let filter = base.not_session(session);
        let filter = match &query.working_directory {
            Some(cwd) => filter.not_directory(cwd),
            None => filter,
        };
        self.fill_from(&mut ranked, Scope::Global, filter, fetch)?;

        let entries = ranked.entries;
        Ok(match query.window {
            Window::Limit(_) => entries,
            Window::Offset(i) => entries.into_iter().nth(i).into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCommand;

    fn zsh() -> SessionId {
        SessionId::new("zsh", 100)
    }

    fn texts(entries: &[RankedCommand]) -> Vec<&str> {
        entries.iter().map(|e| e.record.command.as_str()).collect()
    }

    #[test]
    fn test_adjacent_repeats_collapse() {
        let mut store = HistoryStore::open_memory().unwrap();
        for (i, text) in ["a", "b", "a", "a", "c"].into_iter().enumerate() {
            store
                .insert_command(
                    &NewCommand::new(text, "/")
                        .with_timestamp(1000 + i64::try_from(i).unwrap())
                        .with_session(zsh()),
                )
                .unwrap();
        }

        let result = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Limit(3)))
            .unwrap();
        assert_eq!(texts(&result), vec!["c", "a", "b"]);

        // Adjacency only: the earlier "a" is still a candidate.
        let all = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Limit(10)))
            .unwrap();
        assert_eq!(texts(&all), vec!["c", "a", "b", "a"]);
    }

    #[test]
    fn test_scopes_merge_in_priority_order() {
        let mut store = HistoryStore::open_memory().unwrap();
        let bash = SessionId::new("bash", 200);
        store.insert_command(&NewCommand::new("global-old", "/x")).unwrap();
        store
            .insert_command(&NewCommand::new("dir-cmd", "/repo").with_session(bash.clone()))
            .unwrap();
        store
            .insert_command(&NewCommand::new("session-cmd", "/repo").with_session(zsh()))
            .unwrap();
        store.insert_command(&NewCommand::new("global-new", "/y")).unwrap();

        let result = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Limit(10)).in_directory("/repo"))
            .unwrap();

        assert_eq!(
            texts(&result),
            vec!["session-cmd", "dir-cmd", "global-new", "global-old"]
        );
        let scopes: Vec<Scope> = result.iter().map(|e| e.scope).collect();
        assert_eq!(
            scopes,
            vec![Scope::Session, Scope::Directory, Scope::Global, Scope::Global]
        );

        let mut ids: Vec<i64> = result.iter().map(|e| e.record.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), result.len(), "no row appears twice");
    }

    #[test]
    fn test_no_adjacent_duplicates_across_scope_boundary() {
        let mut store = HistoryStore::open_memory().unwrap();
        store.insert_command(&NewCommand::new("make", "/other")).unwrap();
        store
            .insert_command(&NewCommand::new("make", "/repo").with_session(zsh()))
            .unwrap();

        let result = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Limit(5)))
            .unwrap();
        assert_eq!(texts(&result), vec!["make"]);
        for pair in result.windows(2) {
            assert_ne!(pair[0].record.command, pair[1].record.command);
        }
    }

    #[test]
    fn test_offset_returns_single_entry() {
        let mut store = HistoryStore::open_memory().unwrap();
        for text in ["a", "b", "c"] {
            store
                .insert_command(&NewCommand::new(text, "/").with_session(zsh()))
                .unwrap();
        }

        let at_one = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Offset(1)))
            .unwrap();
        assert_eq!(texts(&at_one), vec!["b"]);

        let past_end = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Offset(9)))
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_unknown_session_has_empty_bucket() {
        let mut store = HistoryStore::open_memory().unwrap();
        store.insert_command(&NewCommand::new("ls", "/")).unwrap();

        let result = store
            .recent_unique(&RecentQuery::new(SessionId::new("fish", 1), Window::Limit(5)))
            .unwrap();
        assert_eq!(texts(&result), vec!["ls"]);
        assert_eq!(result[0].scope, Scope::Global);
    }

    #[test]
    fn test_missing_app_name_is_rejected() {
        let store = HistoryStore::open_memory().unwrap();
        let result = store.recent_unique(&RecentQuery::new(SessionId::new("", 1), Window::Limit(5)));
        assert!(matches!(result, Err(Error::MissingSessionIdentity(_))));
    }

    #[test]
    fn test_collapsed_page_reads_further_into_scope() {
        let mut store = HistoryStore::open_memory().unwrap();
        store.insert_command(&NewCommand::new("z", "/other")).unwrap();
        store
            .insert_command(&NewCommand::new("b", "/").with_session(zsh()))
            .unwrap();
        for _ in 0..60 {
            store
                .insert_command(&NewCommand::new("a", "/").with_session(zsh()))
                .unwrap();
        }

        let result = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Limit(2)))
            .unwrap();
        assert_eq!(texts(&result), vec!["a", "b"]);
        assert!(result.iter().all(|e| e.scope == Scope::Session));
    }

    #[test]
    fn test_full_session_skips_wider_scopes() {
        let mut store = HistoryStore::open_memory().unwrap();
        store.insert_command(&NewCommand::new("global", "/")).unwrap();
        for text in ["x", "y"] {
            store
                .insert_command(&NewCommand::new(text, "/").with_session(zsh()))
                .unwrap();
        }

        let result = store
            .recent_unique(&RecentQuery::new(zsh(), Window::Limit(2)))
            .unwrap();
        assert!(result.iter().all(|e| e.scope == Scope::Session));
        assert_eq!(texts(&result), vec!["y", "x"]);
    }
}
