//! Identifier-ordered range retrieval.
//!
//! Within a range only the highest-id occurrence of each command text
//! survives, and results come back in ascending id order. Non-positive
//! bounds count back from the newest command: `0` is the newest, `-1` the
//! one before it.
//!
//! Dedup is computed one of two ways:
//!
//! - **Aggregate**: `MAX(id) ... GROUP BY command` over the filtered range.
//! - **Flag**: the `is_duplicate` column kept current at insert time.
//!
//! The flag answers "does this text appear again anywhere later", so it only
//! agrees with the aggregate when the range reaches the newest id and no
//! session filter narrows the rows. Outside that case the aggregate serves.

use crate::error::Result;
use crate::history::scope::CommandFilter;
use crate::model::{CommandRecord, SessionId};
use crate::storage::schema::COMMAND_SELECT;
use crate::storage::sqlite::{map_command_row, max_command_id};
use crate::storage::HistoryStore;
use rusqlite::Connection;
use tracing::debug;

/// How duplicate texts inside a range are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Group the filtered range by text.
    Aggregate,
    /// Read the precomputed flag when it gives the same answer.
    #[default]
    Flag,
}

/// Input for [`HistoryStore::range_unique`].
#[derive(Debug, Clone, Default)]
pub struct RangeQuery {
    pub first: i64,
    pub last: i64,
    /// Shell glob over the command text.
    pub pattern: Option<String>,
    /// Only rows from this session's active source row.
    pub session: Option<SessionId>,
    pub strategy: DedupStrategy,
}

impl RangeQuery {
    #[must_use]
    pub fn new(first: i64, last: i64) -> Self {
        Self {
            first,
            last,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: DedupStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Resolve a bound against the newest id; `0` and below count back from it.
#[must_use]
pub const fn resolve_bound(bound: i64, max_id: i64) -> i64 {
    if bound > 0 {
        bound
    } else {
        max_id.saturating_add(bound)
    }
}

/// Unique rows of `query`, read through `conn`.
fn range_in(conn: &Connection, query: &RangeQuery) -> Result<Vec<CommandRecord>> {
    let Some(max_id) = max_command_id(conn)? else {
        return Ok(Vec::new());
    };
    let first = resolve_bound(query.first, max_id);
    let last = resolve_bound(query.last, max_id);
    if first > last {
        debug!(first, last, "Empty range");
        return Ok(Vec::new());
    }

    let mut filter = CommandFilter::new().id_range(first, last);
    if let Some(pattern) = &query.pattern {
        filter = filter.glob(pattern);
    }
    if let Some(session) = &query.session {
        filter = filter.session(session);
    }

    let use_flag =
        query.strategy == DedupStrategy::Flag && last >= max_id && query.session.is_none();
    let sql = if use_flag {
        filter = filter.unique_only();
        format!("{COMMAND_SELECT}{} ORDER BY c.id", filter.where_clause())
    } else {
        format!(
            "{COMMAND_SELECT} WHERE c.id IN (SELECT MAX(c.id) FROM commands c{} GROUP BY c.command) ORDER BY c.id",
            filter.where_clause()
        )
    };
    debug!(first, last, use_flag, "Range query");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(filter.params()), map_command_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl HistoryStore {
    /// Unique commands with ids in `[first, last]`, ascending.
    ///
    /// An inverted range yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn range_unique(&self, query: &RangeQuery) -> Result<Vec<CommandRecord>> {
        // Bound resolution and the select share one snapshot, so a command
        // recorded in between cannot flag a row inside the range.
        let tx = self.conn().unchecked_transaction()?;
        let rows = range_in(&tx, query)?;
        tx.commit()?;
        Ok(rows)
    }

    /// Stream `(id, text)` for every command whose text does not reappear
    /// later, newest first.
    ///
    /// # Errors
    ///
    /// Returns the first error from the query or the callback; the stream
    /// stops there.
    pub fn for_each_unique<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(i64, &str) -> Result<()>,
    {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, command FROM commands WHERE is_duplicate = 0 ORDER BY id DESC")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let text: String = row.get(1)?;
            callback(id, &text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::NewCommand;
    use tempfile::TempDir;

    fn store_with(texts: &[&str]) -> HistoryStore {
        let mut store = HistoryStore::open_memory().unwrap();
        for text in texts {
            store.insert_command(&NewCommand::new(*text, "/")).unwrap();
        }
        store
    }

    fn pairs(rows: &[CommandRecord]) -> Vec<(i64, &str)> {
        rows.iter().map(|r| (r.id, r.command.as_str())).collect()
    }

    #[test]
    fn test_keeps_highest_id_per_text() {
        let store = store_with(&["ls", "git status", "ls", "make"]);
        let rows = store.range_unique(&RangeQuery::new(1, 4)).unwrap();
        assert_eq!(pairs(&rows), vec![(2, "git status"), (3, "ls"), (4, "make")]);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let store = store_with(&["a", "b", "c"]);
        assert!(store.range_unique(&RangeQuery::new(3, 1)).unwrap().is_empty());
        assert!(HistoryStore::open_memory()
            .unwrap()
            .range_unique(&RangeQuery::new(1, 10))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_positive_bounds_count_from_end() {
        let store = store_with(&["a", "b", "c", "d"]);
        let rows = store.range_unique(&RangeQuery::new(-2, 0)).unwrap();
        assert_eq!(pairs(&rows), vec![(2, "b"), (3, "c"), (4, "d")]);

        assert_eq!(resolve_bound(5, 10), 5);
        assert_eq!(resolve_bound(0, 10), 10);
        assert_eq!(resolve_bound(-3, 10), 7);
    }

    #[test]
    fn test_glob_pattern() {
        let store = store_with(&["git status", "gitk", "git push", "git status", "ls"]);
        let rows = store
            .range_unique(&RangeQuery::new(1, 0).with_pattern("git *"))
            .unwrap();
        assert_eq!(pairs(&rows), vec![(3, "git push"), (4, "git status")]);
    }

    #[test]
    fn test_session_variant() {
        let mut store = HistoryStore::open_memory().unwrap();
        let zsh = SessionId::new("zsh", 1);
        store
            .insert_command(&NewCommand::new("make", "/").with_session(zsh.clone()))
            .unwrap();
        store.insert_command(&NewCommand::new("make", "/")).unwrap();
        store.insert_command(&NewCommand::new("ls", "/")).unwrap();

        // The later "make" belongs to no session, so the session's own stays.
        let rows = store
            .range_unique(&RangeQuery::new(1, 0).with_session(zsh.clone()))
            .unwrap();
        assert_eq!(pairs(&rows), vec![(1, "make")]);

        store.close_session(1).unwrap();
        let rows = store.range_unique(&RangeQuery::new(1, 0).with_session(zsh)).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_strategies_agree() {
        let store = store_with(&["a", "b", "a", "c", "b", "git x", "a", "git y", "git x"]);
        let cases = [
            RangeQuery::new(1, 0),
            RangeQuery::new(4, 0),
            RangeQuery::new(2, 6),
            RangeQuery::new(-3, 0),
            RangeQuery::new(1, 0).with_pattern("git *"),
        ];
        for case in cases {
            let aggregate = store
                .range_unique(&case.clone().with_strategy(DedupStrategy::Aggregate))
                .unwrap();
            let flag = store
                .range_unique(&case.clone().with_strategy(DedupStrategy::Flag))
                .unwrap();
            assert_eq!(pairs(&aggregate), pairs(&flag), "range {case:?}");
        }
    }

    #[test]
    fn test_range_reads_one_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");
        let mut reader = HistoryStore::open(&path).unwrap();
        for text in ["ls", "make"] {
            reader.insert_command(&NewCommand::new(text, "/")).unwrap();
        }
        let mut writer = HistoryStore::open(&path).unwrap();

        let tx = reader.conn().unchecked_transaction().unwrap();
        let before = range_in(&tx, &RangeQuery::new(1, 0)).unwrap();
        assert_eq!(pairs(&before), vec![(1, "ls"), (2, "make")]);

        // A later "ls" flags id 1 for everyone outside the open read.
        writer.insert_command(&NewCommand::new("ls", "/")).unwrap();
        let after = range_in(&tx, &RangeQuery::new(1, 0)).unwrap();
        assert_eq!(pairs(&after), pairs(&before));
        tx.commit().unwrap();

        let fresh = reader.range_unique(&RangeQuery::new(1, 0)).unwrap();
        assert_eq!(pairs(&fresh), vec![(2, "make"), (3, "ls")]);
    }

    #[test]
    fn test_for_each_unique_streams_newest_first() {
        let store = store_with(&["a", "b", "a", "c"]);
        let mut seen = Vec::new();
        store
            .for_each_unique(|id, text| {
                seen.push((id, text.to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![(4, "c".to_string()), (3, "a".to_string()), (2, "b".to_string())]
        );
    }

    #[test]
    fn test_for_each_unique_stops_on_callback_error() {
        let store = store_with(&["a", "b", "c"]);
        let mut calls = 0;
        let result = store.for_each_unique(|_, _| {
            calls += 1;
            Err(Error::Other("broken pipe".into()))
        });
        assert!(matches!(result, Err(Error::Other(_))));
        assert_eq!(calls, 1);
    }
}
