//! Shared data model for postdesk
//!
//! This crate defines the types that cross crate boundaries:
//! - Posts as served by the remote collection, and their cached form
//! - Users, roles and the permissions a role grants

mod auth;
mod types;

pub use auth::*;
pub use types::*;
