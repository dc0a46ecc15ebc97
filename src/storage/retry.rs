//! Bounded retry for acquiring the write lock.
//!
//! Every shell writes to the same file, so `BEGIN IMMEDIATE` can fail with
//! `SQLITE_BUSY` even after the connection's busy handler gave up. That is
//! expected contention, not a failure: back off and try again, and only
//! report [`Error::Busy`] once the budget is spent.

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;
use tracing::warn;

/// How hard to try for the write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep before the second attempt; doubles after each failure.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1_u32 << attempt.saturating_sub(1).min(16))
    }
}

/// True for lock contention errors.
#[must_use]
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

/// Begin an IMMEDIATE transaction, retrying on lock contention.
///
/// Takes `&Connection` so the retry loop can borrow repeatedly; callers
/// must not already be inside a transaction on this connection.
///
/// # Errors
///
/// Returns [`Error::Busy`] when the retry budget is exhausted, or the
/// underlying database error for anything other than contention.
pub fn begin_immediate<'c>(conn: &'c Connection, policy: &RetryPolicy) -> Result<Transaction<'c>> {
    let mut attempt = 1;
    loop {
        match Transaction::new_unchecked(conn, TransactionBehavior::Immediate) {
            Ok(tx) => return Ok(tx),
            Err(e) if is_busy(&e) && attempt < policy.max_attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "Write lock busy, retrying"
                );
                std::thread::sleep(backoff);
                attempt += 1;
            }
            Err(e) if is_busy(&e) => return Err(Error::Busy { attempts: attempt }),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(25));
        assert_eq!(policy.backoff(2), Duration::from_millis(50));
        assert_eq!(policy.backoff(3), Duration::from_millis(100));
    }

    #[test]
    fn test_begin_immediate_uncontended() {
        let conn = Connection::open_in_memory().unwrap();
        let tx = begin_immediate(&conn, &RetryPolicy::default()).unwrap();
        tx.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_contention_exhausts_budget() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lock.db");

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE; CREATE TABLE t (x INTEGER);").unwrap();

        let waiter = Connection::open(&path).unwrap();
        waiter.busy_timeout(Duration::from_millis(1)).unwrap();
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        };

        let result = begin_immediate(&waiter, &policy);
        assert!(matches!(result, Err(Error::Busy { attempts: 3 })));

        holder.execute_batch("COMMIT").unwrap();
        assert!(begin_immediate(&waiter, &policy).is_ok());
    }
}
