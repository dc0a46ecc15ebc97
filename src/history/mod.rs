//! History resolution.
//!
//! Answers "which command did the user mean" from three nested scopes:
//!
//! - [`search`]: single most recent prefix match, narrowest scope first
//! - [`recent`]: ranked recent commands with adjacent repeats removed
//! - [`range`]: id-ordered ranges keeping one row per command text
//!
//! [`scope`] holds the filters all three build their queries from.

pub mod range;
pub mod recent;
pub mod scope;
pub mod search;

pub use range::{DedupStrategy, RangeQuery};
pub use recent::{RankedCommand, RecentQuery, Window};
pub use scope::{Scope, TOOL_NAME};
pub use search::{PrefixQuery, SearchHit};
