//! Error types for the hist CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for hist operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,
    DatabaseBusy,
    MigrationFailed,
    SchemaTooNew,

    // Not Found (exit 3)
    CommandNotFound,

    // Validation (exit 4)
    MissingSessionIdentity,
    InvalidArgument,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DatabaseBusy => "DATABASE_BUSY",
            Self::MigrationFailed => "MIGRATION_FAILED",
            Self::SchemaTooNew => "SCHEMA_TOO_NEW",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
            Self::MissingSessionIdentity => "MISSING_SESSION_IDENTITY",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::DatabaseError
            | Self::DatabaseBusy
            | Self::MigrationFailed
            | Self::SchemaTooNew => 2,
            Self::CommandNotFound => 3,
            Self::MissingSessionIdentity | Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry (possibly with corrected input).
    ///
    /// Only input errors qualify. An exhausted lock budget is final for
    /// that operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::MissingSessionIdentity | Self::InvalidArgument)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in hist operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `hist init` first")]
    NotInitialized,

    #[error("Command not found: {id}")]
    CommandNotFound { id: i64 },

    #[error("Missing session identity: {0}")]
    MissingSessionIdentity(String),

    #[error("Database is busy: write lock not acquired after {attempts} attempts")]
    Busy { attempts: u32 },

    #[error("Migration to v{version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database schema version ({found}) is newer than supported ({supported})")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::CommandNotFound { .. } => ErrorCode::CommandNotFound,
            Self::MissingSessionIdentity(_) => ErrorCode::MissingSessionIdentity,
            Self::Busy { .. } => ErrorCode::DatabaseBusy,
            Self::Migration { .. } => ErrorCode::MigrationFailed,
            Self::SchemaTooNew { .. } => ErrorCode::SchemaTooNew,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `hist init` to create the history database".to_string()),

            Self::CommandNotFound { id } => Some(format!(
                "No command with ID {id}. Use `hist list` to see recorded commands."
            )),

            Self::MissingSessionIdentity(_) => Some(
                "Pass the shell identity explicitly:\n  \
                 hist --app zsh --pid $$ <command>\n  \
                 or export HIST_APP and HIST_PID from your shell hook"
                    .to_string(),
            ),

            Self::Busy { .. } => Some(
                "Another shell held the write lock past the busy timeout. Raise --busy-timeout-ms."
                    .to_string(),
            ),

            Self::Migration { .. } => Some(
                "The database was left at its previous schema version. \
                 Check disk space and permissions, then rerun."
                    .to_string(),
            ),

            Self::SchemaTooNew { .. } => {
                Some("This database was written by a newer hist. Upgrade hist.".to_string())
            }

            Self::InvalidArgument(msg) => {
                if msg.contains("range") {
                    Some(
                        "Ranges are FIRST [LAST]; non-positive values count back from the \
                         latest command (0 = latest, -1 = the one before, `-9 0` = last ten)"
                            .to_string(),
                    )
                } else {
                    None
                }
            }

            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Other(_) => {
                None
            }
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(Error::Busy { attempts: 3 }.exit_code(), 2);
        assert_eq!(Error::CommandNotFound { id: 7 }.exit_code(), 3);
        assert_eq!(Error::MissingSessionIdentity("no app".into()).exit_code(), 4);
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_busy_is_not_retryable() {
        assert!(!ErrorCode::DatabaseBusy.is_retryable());
        assert!(ErrorCode::InvalidArgument.is_retryable());
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let json = Error::CommandNotFound { id: 42 }.to_structured_json();
        assert_eq!(json["error"]["code"], "COMMAND_NOT_FOUND");
        assert_eq!(json["error"]["exit_code"], 3);
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("42"));
    }

    #[test]
    fn test_structured_json_without_hint() {
        let json = Error::Other("boom".into()).to_structured_json();
        assert!(json["error"].get("hint").is_none());
    }
}
