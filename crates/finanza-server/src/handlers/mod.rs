//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod auth;
pub mod categories;
pub mod insights;
pub mod status;
pub mod summary;
pub mod transactions;

// Re-export all handlers for use in router
pub use auth::*;
pub use categories::*;
pub use insights::*;
pub use status::*;
pub use summary::*;
pub use transactions::*;
