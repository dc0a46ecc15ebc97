//! SQLite storage layer for hist.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so shells can read while another shell writes
//! - IMMEDIATE transactions with bounded lock retry for every write
//! - Versioned, per-step transactional schema migrations
//!
//! # Submodules
//!
//! - [`migrations`] - Ordered schema steps and the version marker
//! - [`retry`] - Write-lock acquisition with backoff
//! - [`schema`] - DDL for each layout version
//! - [`sqlite`] - Main storage implementation

pub mod migrations;
pub mod retry;
pub mod schema;
pub mod sqlite;

pub use migrations::LATEST_VERSION;
pub use retry::RetryPolicy;
pub use sqlite::{HistoryStore, StoreStats};
