//! Transaction list lifecycle
//!
//! A [`Ledger`] owns the in-memory transaction list of one owner and keeps it
//! in step with a [`TransactionStore`]. Mutations are applied to a copy of the
//! list and published only after the store has acknowledged them, so a store
//! failure never leaves memory and storage disagreeing.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::category::CategoryCatalog;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionId, UserId};
use crate::store::TransactionStore;
use crate::summary::{summarize, summarize_month, FinancialSummary};

/// Wrap infrastructure failures so callers can tell them from bad input
fn store_error(store: &str, err: Error) -> Error {
    match err {
        Error::Validation(_)
        | Error::NotFound(_)
        | Error::Unauthorized(_)
        | Error::Conflict(_)
        | Error::Store(_) => err,
        other => Error::Store(format!("{} store: {}", store, other)),
    }
}

/// In-memory transaction list of one owner
pub struct Ledger {
    owner: Option<UserId>,
    store: Arc<dyn TransactionStore>,
    state: watch::Sender<Vec<Transaction>>,
    loaded: bool,
}

impl Ledger {
    /// Create an empty, unloaded ledger. `owner` is `None` in local mode.
    pub fn new(store: Arc<dyn TransactionStore>, owner: Option<UserId>) -> Self {
        let (state, _) = watch::channel(Vec::new());
        Self {
            owner,
            store,
            state,
            loaded: false,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replace the list with the store's contents
    pub async fn load(&mut self) -> Result<()> {
        let transactions = self
            .store
            .list(self.owner())
            .await
            .map_err(|e| store_error(self.store.name(), e))?;

        debug!(
            owner = ?self.owner,
            store = self.store.name(),
            count = transactions.len(),
            "Ledger loaded"
        );
        self.state.send_replace(transactions);
        self.loaded = true;
        Ok(())
    }

    /// Snapshot of the current list, most recent first
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe every published change to the list
    pub fn subscribe(&self) -> watch::Receiver<Vec<Transaction>> {
        self.state.subscribe()
    }

    /// Persist a new transaction and prepend it to the list
    pub async fn add(&mut self, tx: NewTransaction) -> Result<Transaction> {
        let created = self
            .store
            .insert(self.owner(), tx)
            .await
            .map_err(|e| store_error(self.store.name(), e))?;

        let mut staged = self.transactions();
        staged.insert(0, created.clone());
        self.state.send_replace(staged);

        info!(owner = ?self.owner, id = %created.id, "Transaction added");
        Ok(created)
    }

    /// Delete a transaction from the store and the list
    pub async fn remove(&mut self, id: &str) -> Result<Transaction> {
        let current = self.transactions();
        let removed = current
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;
        let staged: Vec<Transaction> = current.into_iter().filter(|t| t.id != id).collect();

        match self.store.delete(self.owner(), id).await {
            Ok(()) => {}
            // Already gone from storage; converge memory to match
            Err(Error::NotFound(_)) => {
                warn!(owner = ?self.owner, id = %id, "Transaction missing from store");
            }
            Err(e) => return Err(store_error(self.store.name(), e)),
        }

        self.state.send_replace(staged);
        info!(owner = ?self.owner, id = %id, "Transaction removed");
        Ok(removed)
    }

    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.state.borrow().iter().find(|t| &t.id == id).cloned()
    }

    /// Summary over the whole list
    pub fn summary(&self, catalog: &CategoryCatalog) -> FinancialSummary {
        summarize(self.state.borrow().iter(), catalog)
    }

    /// Summary over one calendar month
    pub fn month_summary(&self, catalog: &CategoryCatalog, year: i32, month: u32) -> FinancialSummary {
        summarize_month(&self.state.borrow(), catalog, year, month)
    }
}
