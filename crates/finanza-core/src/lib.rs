//! Finanza Core Library
//!
//! Shared functionality for the Finanza personal finance tracker:
//! - Money arithmetic in integer cents
//! - Static category catalog
//! - Financial summary aggregation
//! - Transaction stores (SQLite database, local JSON slot)
//! - Email/password identity provider with bearer sessions
//! - Per-owner transaction ledgers with store reconciliation
//! - Pluggable AI backends (Gemini, Ollama, OpenAI-compatible) for insights
//! - Layered configuration (defaults, config.toml, environment)

pub mod ai;
pub mod category;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod insights;
pub mod ledger;
pub mod models;
pub mod money;
pub mod registry;
pub mod store;
pub mod summary;

/// Test utilities including a mock AI server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIClient, GeminiBackend, InsightGenerator, MockBackend, OllamaBackend, OpenAICompatibleBackend,
};
pub use category::{Category, CategoryCatalog};
pub use config::AppConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use identity::{DbIdentity, IdentityProvider};
pub use insights::{InsightRefresh, InsightService};
pub use ledger::Ledger;
pub use models::{
    AIInsight, InsightType, NewTransaction, Session, SessionEvent, Transaction, TransactionDraft,
    TransactionType, User,
};
pub use money::Amount;
pub use registry::{LedgerRegistry, OwnerState};
pub use store::{LocalStore, TransactionStore};
pub use summary::{summarize, summarize_month, CategoryBreakdown, FinancialSummary};
