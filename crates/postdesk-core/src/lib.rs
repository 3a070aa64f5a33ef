//! Core of postdesk
//!
//! This crate contains:
//! - The mutation reconciler keeping the posts cache in step with the remote collection
//! - Optimistic transactions for deletes (snapshot, apply, commit or roll back)
//! - The login flow (form validation, rate limiting, authentication, saved session)
//! - Form validation and input sanitising
//! - Search, sort and pagination for the posts table
//! - A role-gated dashboard tying it all together

mod auth;
mod dashboard;
mod error;
mod locks;
mod reconciler;
mod table;
mod transaction;
mod validation;

pub use auth::*;
pub use dashboard::*;
pub use error::*;
pub use locks::*;
pub use reconciler::*;
pub use table::*;
pub use transaction::*;
pub use validation::*;
