//! Configuration management.
//!
//! Resolves where the history database lives, which shell session a command
//! belongs to, and the git context of the current directory.
//!
//! # Layout
//!
//! - **Database**: `~/.hist/data/history.db`, shared by every shell
//! - **Test database**: `~/.hist/test/history.db` when `HIST_TEST_DB` is set
//!
//! Flags and their environment fallbacks (`HIST_DB`, `HIST_APP`, `HIST_PID`)
//! are read by clap; this module only sees the resolved values.

use crate::error::{Error, Result};
use crate::model::{GitContext, SessionId};

use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the global hist directory location (`~/.hist/`).
#[must_use]
pub fn global_hist_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".hist"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `HIST_TEST_DB=1` (or any value other than
/// empty, `0` or `false`).
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("HIST_TEST_DB")
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.hist/test/history.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_hist_dir().map(|dir| dir.join("test").join("history.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag or `HIST_DB`)
/// 2. `HIST_TEST_DB` → the isolated test database
/// 3. Global location: `~/.hist/data/history.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    global_hist_dir().map(|dir| dir.join("data").join("history.db"))
}

/// Build a session identity from the `--app` / `--pid` values.
///
/// Neither given means "no session". Only one of them, or a blank app name,
/// is a caller error rather than a silent fallback to global history.
///
/// # Errors
///
/// Returns [`Error::MissingSessionIdentity`] for a partial identity.
pub fn resolve_session(app: Option<&str>, pid: Option<i64>) -> Result<Option<SessionId>> {
    let app = app.map(str::trim).filter(|a| !a.is_empty());
    match (app, pid) {
        (None, None) => Ok(None),
        (Some(app), Some(pid)) => Ok(Some(SessionId::new(app, pid))),
        (None, Some(pid)) => Err(Error::MissingSessionIdentity(format!(
            "pid {pid} given without an application name"
        ))),
        (Some(app), None) => Err(Error::MissingSessionIdentity(format!(
            "application {app} given without a pid"
        ))),
    }
}

/// Like [`resolve_session`], but a session is mandatory.
///
/// # Errors
///
/// Returns [`Error::MissingSessionIdentity`] unless both parts are given.
pub fn require_session(app: Option<&str>, pid: Option<i64>) -> Result<SessionId> {
    resolve_session(app, pid)?.ok_or_else(|| {
        Error::MissingSessionIdentity("this command needs --app and --pid".to_string())
    })
}

/// Current working directory as a string.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn current_directory() -> Result<String> {
    Ok(std::env::current_dir()?.to_string_lossy().into_owned())
}

/// Run `git` with `args` and return its trimmed, non-empty stdout.
fn git_output(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Get the current git branch name.
#[must_use]
pub fn current_git_branch() -> Option<String> {
    git_output(&["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Get the `origin` remote URL.
#[must_use]
pub fn current_git_remote() -> Option<String> {
    git_output(&["remote", "get-url", "origin"])
}

/// Git context of the current directory, or `None` outside a repository.
#[must_use]
pub fn current_git_context() -> Option<GitContext> {
    let context = GitContext::new(current_git_remote(), current_git_branch());
    (!context.is_empty()).then_some(context)
}
