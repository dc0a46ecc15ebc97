//! Shell session identity and lifecycle.
//!
//! A session is one interactive shell, identified by the application name
//! (`zsh`, `bash`, ...) and its process id. Its lifecycle has exactly one
//! transition:
//!
//! ```text
//! Active ──close──▶ Closed
//! ```
//!
//! The identity is always passed explicitly into queries; there is no
//! ambient "current session" in the library.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a shell session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    pub app: String,
    pub pid: i64,
}

impl SessionId {
    #[must_use]
    pub fn new(app: impl Into<String>, pid: i64) -> Self {
        Self {
            app: app.into(),
            pid,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.app, self.pid)
    }
}

/// Lifecycle state of a session as seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// At least one active row exists for the identity.
    Active,
    /// Only closed rows exist.
    Closed,
    /// The store has never seen this identity.
    Unknown,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::new("zsh", 4242).to_string(), "zsh:4242");
    }
}
