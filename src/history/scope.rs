//! Scope filters shared by every history query.
//!
//! A [`CommandFilter`] accumulates SQL conditions over the `c` alias of
//! [`COMMAND_SELECT`] together with their positional parameters, so the
//! search, recent and range queries compose the same fragments.

use crate::error::Result;
use crate::model::{CommandRecord, SessionId};
use crate::storage::schema::COMMAND_SELECT;
use crate::storage::sqlite::map_command_row;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;

/// Name this tool is invoked by; its own invocations are hidden by default.
pub const TOOL_NAME: &str = "hist";

/// A slice of history, in decreasing specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Session,
    Directory,
    Global,
}

impl Scope {
    /// Rank used to order merged results (1 = narrowest).
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Session => 1,
            Self::Directory => 2,
            Self::Global => 3,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Directory => "directory",
            Self::Global => "global",
        }
    }
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`.
#[must_use]
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Translate a shell glob (`*`, `?`) into a LIKE pattern.
///
/// LIKE's own wildcards in the input are escaped, so `100%` only matches
/// the literal text.
#[must_use]
pub fn glob_to_like(pattern: &str) -> String {
    let mut like = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        match ch {
            '*' => like.push('%'),
            '?' => like.push('_'),
            '%' | '_' | '\\' => {
                like.push('\\');
                like.push(ch);
            }
            _ => like.push(ch),
        }
    }
    like
}

/// Conditions over `commands c` plus their parameters, in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandFilter {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl CommandFilter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(mut self, condition: &str, params: impl IntoIterator<Item = Value>) -> Self {
        self.conditions.push(condition.to_string());
        self.params.extend(params);
        self
    }

    /// Text starts with `prefix`.
    pub(crate) fn prefix(self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        self.push(
            "c.command LIKE ? ESCAPE '\\'",
            [Value::Text(format!("{}%", escape_like(prefix)))],
        )
    }

    /// Text matches a shell glob.
    pub(crate) fn glob(self, pattern: &str) -> Self {
        self.push(
            "c.command LIKE ? ESCAPE '\\'",
            [Value::Text(glob_to_like(pattern))],
        )
    }

    /// Hide invocations of this tool unless `include_self` is set.
    pub(crate) fn self_invocations(self, include_self: bool) -> Self {
        if include_self {
            return self;
        }
        self.push(
            "c.command != ? AND c.command NOT LIKE ? ESCAPE '\\'",
            [
                Value::Text(TOOL_NAME.to_string()),
                Value::Text(format!("{} %", escape_like(TOOL_NAME))),
            ],
        )
    }

    /// Rows from the session's active source rows.
    pub(crate) fn session(self, session: &SessionId) -> Self {
        self.push(
            "c.source_id IN (SELECT id FROM sources WHERE app = ? AND pid = ? AND active = 1)",
            [Value::Text(session.app.clone()), Value::Integer(session.pid)],
        )
    }

    /// Rows not in the session's active source rows.
    pub(crate) fn not_session(self, session: &SessionId) -> Self {
        self.push(
            "(c.source_id IS NULL OR c.source_id NOT IN
                (SELECT id FROM sources WHERE app = ? AND pid = ? AND active = 1))",
            [Value::Text(session.app.clone()), Value::Integer(session.pid)],
        )
    }

    /// Rows run in `path`.
    pub(crate) fn directory(self, path: &str) -> Self {
        self.push(
            "c.place_id = (SELECT id FROM places WHERE path = ?)",
            [Value::Text(path.to_string())],
        )
    }

    /// Rows not run in `path`.
    pub(crate) fn not_directory(self, path: &str) -> Self {
        self.push(
            "c.place_id IS NOT (SELECT id FROM places WHERE path = ?)",
            [Value::Text(path.to_string())],
        )
    }

    /// Rows with `first <= id <= last`.
    pub(crate) fn id_range(self, first: i64, last: i64) -> Self {
        self.push(
            "c.id BETWEEN ? AND ?",
            [Value::Integer(first), Value::Integer(last)],
        )
    }

    /// Rows older than `id`.
    pub(crate) fn before_id(self, id: i64) -> Self {
        self.push("c.id < ?", [Value::Integer(id)])
    }

    /// Rows whose text does not reappear later.
    pub(crate) fn unique_only(self) -> Self {
        self.push("c.is_duplicate = 0", [])
    }

    pub(crate) fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            " WHERE 1=1".to_string()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> &[Value] {
        &self.params
    }

    /// Newest-first matching records, at most `limit`.
    pub(crate) fn fetch_recent(&self, conn: &Connection, limit: usize) -> Result<Vec<CommandRecord>> {
        let sql = format!(
            "{COMMAND_SELECT}{} ORDER BY c.id DESC LIMIT ?",
            self.where_clause()
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let params = self.params.iter().cloned().chain([Value::Integer(limit)]);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), map_command_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

/// Whether `session` has an active source row to filter on.
pub(crate) fn session_resolvable(conn: &Connection, session: &SessionId) -> Result<bool> {
    Ok(conn
        .prepare("SELECT 1 FROM sources WHERE app = ?1 AND pid = ?2 AND active = 1")?
        .exists(rusqlite::params![session.app, session.pid])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCommand;
    use crate::storage::HistoryStore;

    #[test]
    fn test_glob_translation_escapes_like_wildcards() {
        assert_eq!(glob_to_like("git *"), "git %");
        assert_eq!(glob_to_like("ls ?"), "ls _");
        assert_eq!(glob_to_like("echo 100%_done"), "echo 100\\%\\_done");
        assert_eq!(glob_to_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_scope_priority_order() {
        assert!(Scope::Session.priority() < Scope::Directory.priority());
        assert!(Scope::Directory.priority() < Scope::Global.priority());
    }

    #[test]
    fn test_prefix_is_literal_and_case_sensitive() {
        let mut store = HistoryStore::open_memory().unwrap();
        for text in ["echo 50%", "echo 500", "ECHO 50%"] {
            store.insert_command(&NewCommand::new(text, "/")).unwrap();
        }

        let rows = CommandFilter::new()
            .prefix("echo 50%")
            .fetch_recent(store.conn(), 10)
            .unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(texts, vec!["echo 50%"]);
    }

    #[test]
    fn test_self_invocations_hidden_by_default() {
        let mut store = HistoryStore::open_memory().unwrap();
        for text in ["hist search git", "hist", "history", "git status"] {
            store.insert_command(&NewCommand::new(text, "/")).unwrap();
        }

        let hidden = CommandFilter::new()
            .self_invocations(false)
            .fetch_recent(store.conn(), 10)
            .unwrap();
        let texts: Vec<&str> = hidden.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(texts, vec!["git status", "history"]);

        let shown = CommandFilter::new()
            .self_invocations(true)
            .fetch_recent(store.conn(), 10)
            .unwrap();
        assert_eq!(shown.len(), 4);
    }
}
