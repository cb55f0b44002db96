//! Transaction stores
//!
//! [`TransactionStore`] abstracts durable persistence of transaction records
//! scoped by an optional owner. The relational implementation lives on
//! [`Database`](crate::db::Database); [`LocalStore`] keeps a single JSON slot on
//! disk for operation without an identity provider.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionType};
use crate::money::Amount;

/// File name of the local slot inside the data directory
pub const LOCAL_SLOT_FILE: &str = "finanza_transactions.json";

/// Durable persistence for transaction records
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// All records for `owner`, most recent first
    async fn list(&self, owner: Option<&str>) -> Result<Vec<Transaction>>;

    /// Persist a record and return it with its assigned id
    async fn insert(&self, owner: Option<&str>, tx: NewTransaction) -> Result<Transaction>;

    /// Delete a record. Unknown ids are `NotFound`.
    async fn delete(&self, owner: Option<&str>, id: &str) -> Result<()>;
}

/// Sample records shown on first launch of the local store
pub fn demo_transactions() -> Vec<Transaction> {
    let tx = |id: &str, description: &str, cents: i64, kind, category: &str, day: u32| {
        Transaction {
            id: id.to_string(),
            description: description.to_string(),
            amount: Amount::from_cents(cents).unwrap_or_default(),
            kind,
            category: category.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap_or_default(),
        }
    };

    vec![
        tx("1", "Monthly salary", 500_000, TransactionType::Income, "income", 1),
        tx("2", "Rent", 150_000, TransactionType::Expense, "housing", 5),
        tx("3", "Groceries", 60_000, TransactionType::Expense, "food", 10),
        tx("4", "Fuel", 30_000, TransactionType::Expense, "transport", 12),
    ]
}

/// Single-slot JSON store on the local filesystem
///
/// The slot holds one list regardless of owner. Every mutation rewrites the
/// whole document through a temp file and rename, so a crash leaves either the
/// old or the new list on disk.
pub struct LocalStore {
    path: PathBuf,
    seed: bool,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Open the slot in `data_dir`, creating the directory if needed
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            fs::create_dir_all(data_dir)?;
            info!("Created data directory: {}", data_dir.display());
        }

        Ok(Self {
            path: data_dir.join(LOCAL_SLOT_FILE),
            seed: true,
            write_lock: Mutex::new(()),
        })
    }

    /// Start from an empty list instead of the demo records
    pub fn without_seed(mut self) -> Self {
        self.seed = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slot(&self) -> Result<Vec<Transaction>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Local slot missing, using initial list");
            return Ok(if self.seed {
                demo_transactions()
            } else {
                Vec::new()
            });
        }

        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::Store(format!(
                "Local slot {} is unreadable: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_slot(&self, transactions: &[Transaction]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::Store("Local slot has no parent directory".to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, transactions)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Store(format!("Failed to write local slot: {}", e.error)))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn list(&self, _owner: Option<&str>) -> Result<Vec<Transaction>> {
        let _guard = self.write_lock.lock().await;
        self.read_slot()
    }

    async fn insert(&self, _owner: Option<&str>, tx: NewTransaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut transactions = self.read_slot()?;
        let created = tx.into_transaction(Uuid::new_v4().to_string());
        transactions.insert(0, created.clone());
        self.write_slot(&transactions)?;
        Ok(created)
    }

    async fn delete(&self, _owner: Option<&str>, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut transactions = self.read_slot()?;
        let before = transactions.len();
        transactions.retain(|t| t.id != id);
        if transactions.len() == before {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        self.write_slot(&transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lunch() -> NewTransaction {
        NewTransaction {
            description: "Lunch".to_string(),
            amount: Amount::parse("32.90").unwrap(),
            kind: TransactionType::Expense,
            category: "food".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_slot_yields_demo_list() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        let listed = store.list(None).await.unwrap();
        assert_eq!(listed, demo_transactions());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_without_seed_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap().without_seed();
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_prepends_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        let created = store.insert(None, lunch()).await.unwrap();
        assert!(Uuid::parse_str(&created.id).is_ok());

        let reopened = LocalStore::new(dir.path()).unwrap();
        let listed = reopened.list(None).await.unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0], created);
    }

    #[tokio::test]
    async fn test_largest_amount_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap().without_seed();

        let mut amounts = Vec::new();
        for amount in [Amount::MAX, Amount::from_cents(999_999_999_999_999).unwrap()] {
            let created = store
                .insert(None, NewTransaction { amount, ..lunch() })
                .await
                .unwrap();
            amounts.push(created.amount);
        }

        let reopened = LocalStore::new(dir.path()).unwrap();
        let mut listed: Vec<Amount> = reopened
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.amount)
            .collect();
        listed.reverse();
        assert_eq!(listed, amounts);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        store.delete(None, "2").await.unwrap();
        let listed = store.list(None).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|t| t.id != "2"));

        assert!(matches!(
            store.delete(None, "2").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_slot_is_a_store_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOCAL_SLOT_FILE), "{not json").unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        assert!(matches!(store.list(None).await, Err(Error::Store(_))));
    }
}
