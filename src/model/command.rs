//! Command event model.
//!
//! A `CommandRecord` is the boundary shape of one recorded shell command:
//! the event row joined with its working directory, git context and source
//! session. Absent relations are `None`, never sentinel values.

use serde::{Deserialize, Serialize};

use super::session::SessionId;

/// Git repository context a command ran in.
///
/// Both fields are optional, but a context with neither set is never
/// stored; see [`GitContext::is_empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitContext {
    /// Remote URL of the repository (usually `origin`)
    pub remote: Option<String>,

    /// Checked-out branch name
    pub branch: Option<String>,
}

impl GitContext {
    /// Create a context from its optional parts.
    #[must_use]
    pub fn new(remote: Option<String>, branch: Option<String>) -> Self {
        Self { remote, branch }
    }

    /// True when neither remote nor branch is known.
    ///
    /// An empty context means "no relation", so the command is stored
    /// without a context row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remote.is_none() && self.branch.is_none()
    }
}

/// The shell session a command came from, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub app: String,
    pub pid: i64,
    pub active: bool,
}

/// A recorded command with all of its relations resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Store-assigned identifier, strictly increasing in insertion order
    pub id: i64,

    /// Start time (Unix seconds)
    pub timestamp: i64,

    /// Exit status reported by the shell
    pub exit_status: i64,

    /// Literal command text
    pub command: String,

    /// Absolute working directory
    pub working_directory: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,

    /// Wall-clock duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
}

/// A command about to be recorded.
#[derive(Debug, Clone)]
pub struct NewCommand {
    pub timestamp: i64,
    pub exit_status: i64,
    pub duration_ms: Option<i64>,
    pub command: String,
    pub working_directory: String,
    pub git: Option<GitContext>,
    pub session: Option<SessionId>,
}

impl NewCommand {
    /// Create a command stamped with the current time and exit status 0.
    #[must_use]
    pub fn new(command: impl Into<String>, working_directory: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            exit_status: 0,
            duration_ms: None,
            command: command.into(),
            working_directory: working_directory.into(),
            git: None,
            session: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_exit_status(mut self, exit_status: i64) -> Self {
        self.exit_status = exit_status;
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach a git context; empty contexts are dropped.
    #[must_use]
    pub fn with_git(mut self, git: GitContext) -> Self {
        self.git = if git.is_empty() { None } else { Some(git) };
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }
}
