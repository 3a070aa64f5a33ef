//! Remote posts collection for postdesk
//!
//! This crate defines the interface the core uses to reach the posts
//! REST collection, plus:
//! - An HTTP implementation backed by reqwest
//! - A mock implementation for tests
//! - A retry policy for reads

mod http;
mod mock;
mod retry;
mod traits;

pub use http::*;
pub use mock::*;
pub use retry::*;
pub use traits::*;
