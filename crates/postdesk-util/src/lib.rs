//! Shared utilities for postdesk
//!
//! This crate provides:
//! - ID types (UserId)
//! - Time utilities (monotonic time, duration helpers)
//! - Login attempt rate limiting
//! - Default paths for config and data directories

mod ids;
mod paths;
mod rate_limit;
mod time;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
