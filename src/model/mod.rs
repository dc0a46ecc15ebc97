//! Data models for hist.
//!
//! This module contains the domain models:
//! - CommandRecord / NewCommand (the event and its write-side shape)
//! - GitContext
//! - SessionId / SessionState (shell identity and its lifecycle)

pub mod command;
pub mod session;

pub use command::{CommandRecord, GitContext, NewCommand, SourceRef};
pub use session::{SessionId, SessionState};
