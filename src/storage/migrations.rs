//! Schema evolution.
//!
//! The store's layout version lives in `PRAGMA user_version` (the database
//! header), not in a table. Each entry of [`MIGRATIONS`] moves the store
//! from version `i` to `i + 1`; entries are only ever appended.
//!
//! Every step runs in its own IMMEDIATE transaction that also bumps the
//! version, so a failing step leaves the store exactly at the version it
//! started from. The version is re-read after the write lock is held: when
//! two shells open an old store at once, the second one waits, then finds
//! nothing left to do.

use crate::error::{Error, Result};
use crate::storage::retry::{begin_immediate, RetryPolicy};
use crate::storage::schema::{V1_COMMANDS, V2_PLACES, V3_CONTEXTS, V4_SOURCES, V5_DUPLICATE_FLAG};
use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

/// A single schema step.
pub struct Migration {
    /// Version the store is at after this step.
    pub version: u32,
    pub description: &'static str,
    pub apply: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

/// All steps in order. Never reorder or remove entries.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create command log",
        apply: create_commands,
    },
    Migration {
        version: 2,
        description: "normalize working directories",
        apply: normalize_places,
    },
    Migration {
        version: 3,
        description: "add git contexts",
        apply: add_contexts,
    },
    Migration {
        version: 4,
        description: "add source sessions and durations",
        apply: add_sources,
    },
    Migration {
        version: 5,
        description: "add duplicate flag",
        apply: add_duplicate_flag,
    },
];

/// Version a fully migrated store reports.
#[allow(clippy::cast_possible_truncation)]
pub const LATEST_VERSION: u32 = MIGRATIONS.len() as u32;

fn create_commands(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(V1_COMMANDS)
}

/// Rebuild `commands` around `places`.
///
/// Dropping the old table also drops its `sqlite_sequence` entry, so the
/// high-water mark is carried over by hand to keep ids from being reused.
fn normalize_places(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    let high_water: Option<i64> = tx
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = 'commands'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    tx.execute_batch(V2_PLACES)?;

    if let Some(seq) = high_water {
        tx.execute(
            "UPDATE sqlite_sequence SET seq = MAX(seq, ?1) WHERE name = 'commands'",
            [seq],
        )?;
        if tx.changes() == 0 {
            tx.execute(
                "INSERT INTO sqlite_sequence (name, seq) VALUES ('commands', ?1)",
                [seq],
            )?;
        }
    }
    Ok(())
}

fn add_contexts(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(V3_CONTEXTS)
}

fn add_sources(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(V4_SOURCES)
}

fn add_duplicate_flag(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(V5_DUPLICATE_FLAG)
}

/// Read the persisted version marker.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    u32::try_from(version).map_err(|_| Error::Other(format!("Invalid schema version {version}")))
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    // PRAGMA takes no parameters; version is an integer.
    conn.execute_batch(&format!("PRAGMA user_version = {version}"))
}

/// Bring the store to [`LATEST_VERSION`].
///
/// Returns the version the store was at before. Already-current stores are
/// left untouched without taking the write lock.
///
/// # Errors
///
/// Returns [`Error::Migration`] if a step fails (the store stays at the
/// version before that step), [`Error::SchemaTooNew`] for stores written by a
/// newer release, or [`Error::Busy`] if the write lock never frees up.
pub fn run_migrations(conn: &Connection, policy: &RetryPolicy) -> Result<u32> {
    apply_migrations(conn, MIGRATIONS, policy)
}

pub(crate) fn apply_migrations(
    conn: &Connection,
    migrations: &[Migration],
    policy: &RetryPolicy,
) -> Result<u32> {
    #[allow(clippy::cast_possible_truncation)]
    let latest = migrations.len() as u32;
    let initial = schema_version(conn)?;

    if initial > latest {
        return Err(Error::SchemaTooNew {
            found: initial,
            supported: latest,
        });
    }
    if initial == latest {
        debug!(version = initial, "Schema is current");
        return Ok(initial);
    }

    loop {
        let tx = begin_immediate(conn, policy)?;

        // Another process may have migrated while we waited for the lock.
        let current = schema_version(&tx)?;
        if current > latest {
            return Err(Error::SchemaTooNew {
                found: current,
                supported: latest,
            });
        }
        if current == latest {
            tx.commit()?;
            break;
        }

        let step = &migrations[current as usize];
        info!(
            version = step.version,
            description = step.description,
            "Applying migration"
        );

        (step.apply)(&tx).map_err(|source| Error::Migration {
            version: step.version,
            source,
        })?;
        set_schema_version(&tx, step.version).map_err(|source| Error::Migration {
            version: step.version,
            source,
        })?;
        tx.commit().map_err(|source| Error::Migration {
            version: step.version,
            source,
        })?;

        info!(version = step.version, "Migration complete");
    }

    Ok(initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{column_exists, table_names};
    use tempfile::TempDir;

    /// Migrate a fresh connection up to (and including) `version`.
    fn migrate_to(conn: &Connection, version: usize) {
        apply_migrations(conn, &MIGRATIONS[..version], &RetryPolicy::default()).unwrap();
    }

    #[test]
    fn test_versions_are_contiguous() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1);
        }
        assert_eq!(LATEST_VERSION, 5);
    }

    #[test]
    fn test_fresh_store_reaches_latest() {
        let conn = Connection::open_in_memory().unwrap();
        let before = run_migrations(&conn, &RetryPolicy::default()).unwrap();
        assert_eq!(before, 0);
        assert_eq!(schema_version(&conn).unwrap(), LATEST_VERSION);

        let tables = table_names(&conn).unwrap();
        for table in ["commands", "contexts", "places", "sources"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
        assert!(!tables.contains(&"commands_rebuild".to_string()));
        assert!(column_exists(&conn, "commands", "is_duplicate").unwrap());
        assert!(!column_exists(&conn, "commands", "working_directory").unwrap());
    }

    #[test]
    fn test_current_store_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn, &RetryPolicy::default()).unwrap();
        let before = run_migrations(&conn, &RetryPolicy::default()).unwrap();
        assert_eq!(before, LATEST_VERSION);
        assert_eq!(schema_version(&conn).unwrap(), LATEST_VERSION);
    }

    /// The same three rows in the layout of `version`.
    fn seed_rows(conn: &Connection, version: usize) {
        let sql = if version == 1 {
            "INSERT INTO commands (timestamp, exit_status, command, working_directory) VALUES
                (100, 0, 'ls', '/home'),
                (101, 1, 'make', '/src'),
                (102, 0, 'ls', '/home');"
        } else {
            "INSERT INTO places (id, path) VALUES (1, '/home'), (2, '/src');
             INSERT INTO commands (timestamp, exit_status, command, place_id) VALUES
                (100, 0, 'ls', 1),
                (101, 1, 'make', 2),
                (102, 0, 'ls', 1);"
        };
        conn.execute_batch(sql).unwrap();
    }

    #[test]
    fn test_upgrade_preserves_rows() {
        for start in 1..LATEST_VERSION as usize {
            let conn = Connection::open_in_memory().unwrap();
            migrate_to(&conn, start);
            seed_rows(&conn, start);

            let before = run_migrations(&conn, &RetryPolicy::default()).unwrap();
            assert_eq!(before as usize, start);
            assert_eq!(schema_version(&conn).unwrap(), LATEST_VERSION);

            let rows: Vec<(i64, i64, i64, String, String, bool)> = conn
                .prepare(
                    "SELECT c.id, c.timestamp, c.exit_status, c.command, p.path, c.is_duplicate
                     FROM commands c JOIN places p ON p.id = c.place_id ORDER BY c.id",
                )
                .unwrap()
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)))
                .unwrap()
                .collect::<rusqlite::Result<_>>()
                .unwrap();

            assert_eq!(
                rows,
                vec![
                    (1, 100, 0, "ls".to_string(), "/home".to_string(), true),
                    (2, 101, 1, "make".to_string(), "/src".to_string(), false),
                    (3, 102, 0, "ls".to_string(), "/home".to_string(), false),
                ],
                "upgrade from v{start}"
            );

            let places: i64 = conn
                .query_row("SELECT COUNT(*) FROM places", [], |r| r.get(0))
                .unwrap();
            assert_eq!(places, 2, "upgrade from v{start}");
        }
    }

    #[test]
    fn test_rebuild_keeps_id_high_water_mark() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_to(&conn, 1);

        conn.execute_batch(
            "INSERT INTO commands (timestamp, exit_status, command, working_directory)
                VALUES (1, 0, 'a', '/'), (2, 0, 'b', '/');
             DELETE FROM commands WHERE id = 2;",
        )
        .unwrap();

        run_migrations(&conn, &RetryPolicy::default()).unwrap();

        conn.execute("INSERT INTO places (path) VALUES ('/x')", []).unwrap();
        conn.execute(
            "INSERT INTO commands (timestamp, exit_status, command, place_id)
             VALUES (3, 0, 'c', (SELECT id FROM places WHERE path = '/x'))",
            [],
        )
        .unwrap();
        assert_eq!(conn.last_insert_rowid(), 3);
    }

    fn broken_step(tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute_batch("CREATE TABLE half_done (x INTEGER);")?;
        tx.execute_batch("INSERT INTO no_such_table VALUES (1);")
    }

    #[test]
    fn test_failed_step_leaves_previous_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_to(&conn, 2);

        let steps = [
            Migration { version: 1, description: "v1", apply: create_commands },
            Migration { version: 2, description: "v2", apply: normalize_places },
            Migration { version: 3, description: "broken", apply: broken_step },
        ];

        let result = apply_migrations(&conn, &steps, &RetryPolicy::default());
        assert!(matches!(result, Err(Error::Migration { version: 3, .. })));

        assert_eq!(schema_version(&conn).unwrap(), 2);
        assert!(!table_names(&conn).unwrap().contains(&"half_done".to_string()));
    }

    fn broken_rebuild(tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute_batch(
            "CREATE TABLE commands_rebuild AS SELECT * FROM commands;
             DROP TABLE commands;
             ALTER TABLE commands_rebuild RENAME TO commands;",
        )?;
        tx.execute_batch("SELECT no_such_function();")
    }

    #[test]
    fn test_failed_rebuild_restores_table() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_to(&conn, 1);
        conn.execute(
            "INSERT INTO commands (timestamp, exit_status, command, working_directory)
             VALUES (1, 0, 'ls', '/')",
            [],
        )
        .unwrap();

        let steps = [
            Migration { version: 1, description: "v1", apply: create_commands },
            Migration { version: 2, description: "broken rebuild", apply: broken_rebuild },
        ];
        assert!(apply_migrations(&conn, &steps, &RetryPolicy::default()).is_err());

        assert_eq!(schema_version(&conn).unwrap(), 1);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM commands", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert!(column_exists(&conn, "commands", "working_directory").unwrap());
    }

    #[test]
    fn test_newer_store_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        set_schema_version(&conn, LATEST_VERSION + 1).unwrap();

        let err = run_migrations(&conn, &RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::SchemaTooNew { .. }));
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_concurrent_openers_serialize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let conn = Connection::open(&path).unwrap();
                    conn.busy_timeout(std::time::Duration::from_secs(5)).unwrap();
                    run_migrations(&conn, &RetryPolicy::default()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let conn = Connection::open(&path).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), LATEST_VERSION);
        let check: String = conn
            .query_row("PRAGMA integrity_check", [], |r| r.get(0))
            .unwrap();
        assert_eq!(check, "ok");
    }
}
