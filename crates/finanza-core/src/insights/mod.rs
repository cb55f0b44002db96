//! AI insights
//!
//! Short, non-authoritative tips derived from a transaction history. The
//! [`InsightService`] wraps a configured generator with a loading guard and a
//! timeout, and degrades to a generic tip whenever generation fails.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use finanza_core::insights::{InsightRefresh, InsightService};
//!
//! let service = InsightService::new(AIClient::from_env().map(|c| Arc::new(c) as _));
//! if let InsightRefresh::Completed(insights) = service.request(&transactions).await {
//!     render(insights);
//! }
//! ```

pub mod engine;

pub use engine::{InsightRefresh, InsightService, DEFAULT_INSIGHT_TIMEOUT};
