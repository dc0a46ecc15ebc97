//! Database schema definitions.
//!
//! The layout is never created in one shot: every version's DDL lives here
//! and [`super::migrations`] replays them in order, so a fresh store and an
//! upgraded one end up byte-for-byte the same shape.
//!
//! Timestamps are stored as INTEGER Unix seconds; durations as INTEGER
//! milliseconds.

use rusqlite::{Connection, Result};

/// v1: flat command log with the working directory inline.
///
/// `AUTOINCREMENT` keeps identifiers from ever being reused.
pub const V1_COMMANDS: &str = r"
CREATE TABLE commands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    exit_status INTEGER NOT NULL,
    command TEXT NOT NULL,
    working_directory TEXT NOT NULL
);
";

/// v2: working directories move into their own table.
///
/// The `commands` table is rebuilt around `place_id`; the copy and the swap
/// run inside the migration's transaction.
pub const V2_PLACES: &str = r"
CREATE TABLE places (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE
);

INSERT INTO places (path)
SELECT working_directory FROM commands
GROUP BY working_directory
ORDER BY MIN(id);

CREATE TABLE commands_rebuild (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    exit_status INTEGER NOT NULL,
    command TEXT NOT NULL,
    place_id INTEGER NOT NULL REFERENCES places(id)
);

INSERT INTO commands_rebuild (id, timestamp, exit_status, command, place_id)
SELECT c.id, c.timestamp, c.exit_status, c.command, p.id
FROM commands c
JOIN places p ON p.path = c.working_directory
ORDER BY c.id;

DROP TABLE commands;
ALTER TABLE commands_rebuild RENAME TO commands;

CREATE INDEX idx_commands_place ON commands(place_id);
";

/// v3: git repository context.
///
/// SQLite treats NULLs as distinct in UNIQUE constraints, so identity is
/// enforced on an expression index instead.
pub const V3_CONTEXTS: &str = r"
CREATE TABLE contexts (
    id INTEGER PRIMARY KEY,
    remote TEXT,
    branch TEXT
);

CREATE UNIQUE INDEX idx_contexts_identity
    ON contexts(IFNULL(remote, ''), IFNULL(branch, ''));

ALTER TABLE commands ADD COLUMN context_id INTEGER REFERENCES contexts(id);
";

/// v4: source sessions and command duration.
pub const V4_SOURCES: &str = r"
CREATE TABLE sources (
    id INTEGER PRIMARY KEY,
    app TEXT NOT NULL,
    pid INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    UNIQUE(app, pid, active)
);

CREATE INDEX idx_sources_pid_active ON sources(pid, active);

ALTER TABLE commands ADD COLUMN source_id INTEGER REFERENCES sources(id);
ALTER TABLE commands ADD COLUMN duration_ms INTEGER;

CREATE INDEX idx_commands_source ON commands(source_id);
";

/// v5: precomputed duplicate flag.
///
/// Invariant: `is_duplicate = 1` iff a row with the same text and a greater
/// id exists. The backfill establishes it; inserts maintain it.
pub const V5_DUPLICATE_FLAG: &str = r"
ALTER TABLE commands ADD COLUMN is_duplicate INTEGER NOT NULL DEFAULT 0;

UPDATE commands SET is_duplicate = 1
WHERE id NOT IN (SELECT MAX(id) FROM commands GROUP BY command);

CREATE INDEX idx_commands_command ON commands(command);
CREATE INDEX idx_commands_unique ON commands(is_duplicate, id);
";

/// Columns and joins producing a [`crate::model::CommandRecord`] row.
///
/// Column order is what [`crate::storage::sqlite::map_command_row`] reads.
pub const COMMAND_SELECT: &str = "
SELECT c.id, c.timestamp, c.exit_status, c.command, p.path,
       g.remote, g.branch, c.duration_ms, s.app, s.pid, s.active
FROM commands c
JOIN places p ON p.id = c.place_id
LEFT JOIN contexts g ON g.id = c.context_id
LEFT JOIN sources s ON s.id = c.source_id";

/// Set connection pragmas.
///
/// WAL lets readers in other shells proceed while one shell writes.
/// Command text is matched case-sensitively (`LS` is not `ls`).
///
/// # Errors
///
/// Returns an error if a pragma cannot be set.
pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "case_sensitive_like", "ON")?;
    Ok(())
}

/// List user tables.
#[cfg(test)]
pub(crate) fn table_names(conn: &Connection) -> Result<Vec<String>> {
    conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?
    .query_map([], |row| row.get(0))?
    .collect()
}

/// Check if a column exists in a table.
#[cfg(test)]
pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?1");
    conn.prepare(&sql)?.exists([column])
}
