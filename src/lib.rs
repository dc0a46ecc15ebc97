//! hist - shell command history with scoped recall
//!
//! Records every command an interactive shell runs and answers "which
//! command did I mean" from the narrowest scope that has an answer: the
//! current shell session, then the working directory, then all history.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (`CommandRecord`, `NewCommand`, `SessionId`)
//! - [`storage`] - SQLite store and schema migrations
//! - [`history`] - Scoped search, recent and range queries
//! - [`config`] - Database path, session identity and git context
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod storage;

pub use error::{Error, Result};
