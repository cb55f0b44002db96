//! Per-owner application state
//!
//! Each owner (a user id, or `None` in local mode) gets its own ledger and
//! insight service, created lazily on first access. Signing in reloads the
//! owner's list in place; signing out drops the owner's state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ai::InsightGenerator;
use crate::error::Result;
use crate::insights::{InsightService, DEFAULT_INSIGHT_TIMEOUT};
use crate::ledger::Ledger;
use crate::models::{SessionEvent, UserId};
use crate::store::TransactionStore;

/// State held for one owner
pub struct OwnerState {
    /// Serializes list mutations for this owner
    pub ledger: Mutex<Ledger>,
    pub insights: InsightService,
}

/// Lazily populated map of owner state
pub struct LedgerRegistry {
    store: Arc<dyn TransactionStore>,
    generator: Option<Arc<dyn InsightGenerator>>,
    insight_timeout: Duration,
    owners: RwLock<HashMap<Option<UserId>, Arc<OwnerState>>>,
}

impl LedgerRegistry {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        generator: Option<Arc<dyn InsightGenerator>>,
    ) -> Self {
        Self {
            store,
            generator,
            insight_timeout: DEFAULT_INSIGHT_TIMEOUT,
            owners: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_insight_timeout(mut self, timeout: Duration) -> Self {
        self.insight_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn ai_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Get or create the state for `owner` without loading it
    pub async fn get(&self, owner: Option<&str>) -> Arc<OwnerState> {
        let key = owner.map(str::to_string);
        if let Some(state) = self.owners.read().await.get(&key) {
            return state.clone();
        }

        let mut owners = self.owners.write().await;
        owners
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(owner = ?key, "Creating ledger");
                Arc::new(OwnerState {
                    ledger: Mutex::new(Ledger::new(self.store.clone(), key.clone())),
                    insights: InsightService::new(self.generator.clone())
                        .with_timeout(self.insight_timeout),
                })
            })
            .clone()
    }

    /// Get the state for `owner`, loading its ledger on first use
    pub async fn loaded(&self, owner: Option<&str>) -> Result<Arc<OwnerState>> {
        let state = self.get(owner).await;
        {
            let mut ledger = state.ledger.lock().await;
            if !ledger.is_loaded() {
                ledger.load().await?;
            }
        }
        Ok(state)
    }

    /// Drop the state for `owner`; returns whether there was any
    pub async fn forget(&self, owner: Option<&str>) -> bool {
        let key = owner.map(str::to_string);
        self.owners.write().await.remove(&key).is_some()
    }

    /// Reload `owner`'s list from the store if its state is already loaded.
    /// The insight service, including a request in flight, is left alone.
    pub async fn reload(&self, owner: Option<&str>) -> Result<bool> {
        let key = owner.map(str::to_string);
        let Some(state) = self.owners.read().await.get(&key).cloned() else {
            return Ok(false);
        };
        let mut ledger = state.ledger.lock().await;
        if !ledger.is_loaded() {
            return Ok(false);
        }
        ledger.load().await?;
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.owners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reload owner state on sign-in and drop it on sign-out
    pub fn watch_sessions(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<SessionEvent>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedIn { user_id }) => {
                        match registry.reload(Some(&user_id)).await {
                            Ok(true) => debug!(user_id = %user_id, "Reloaded ledger after sign-in"),
                            Ok(false) => {}
                            Err(e) => {
                                warn!(user_id = %user_id, error = %e, "Failed to reload ledger after sign-in")
                            }
                        }
                    }
                    Ok(SessionEvent::SignedOut { user_id }) => {
                        if registry.forget(Some(&user_id)).await {
                            debug!(user_id = %user_id, "Dropped ledger after sign-out");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session event watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AIClient;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> Arc<LedgerRegistry> {
        let store = Arc::new(LocalStore::new(dir.path()).unwrap());
        Arc::new(LedgerRegistry::new(store, Some(Arc::new(AIClient::mock()))))
    }

    #[tokio::test]
    async fn test_get_returns_same_state() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let a = registry.get(Some("ana")).await;
        let b = registry.get(Some("ana")).await;
        let c = registry.get(None).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len().await, 2);
        assert!(registry.ai_configured());
    }

    #[tokio::test]
    async fn test_loaded_loads_once() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let state = registry.loaded(None).await.unwrap();
        assert!(state.ledger.lock().await.is_loaded());
        assert_eq!(state.ledger.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_sign_out_drops_state() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let (tx, rx) = broadcast::channel(8);
        let watcher = registry.watch_sessions(rx);

        registry.get(Some("ana")).await;
        registry.get(Some("bruno")).await;
        tx.send(SessionEvent::SignedOut {
            user_id: "ana".to_string(),
        })
        .unwrap();
        drop(tx);
        watcher.await.unwrap();

        assert_eq!(registry.len().await, 1);
        assert!(!registry.forget(Some("ana")).await);
        assert!(registry.forget(Some("bruno")).await);
    }

    #[tokio::test]
    async fn test_sign_in_reloads_state_in_place() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let (tx, rx) = broadcast::channel(8);
        let watcher = registry.watch_sessions(rx);

        let before = registry.loaded(Some("ana")).await.unwrap();
        assert_eq!(before.ledger.lock().await.len(), 4);
        registry.get(Some("bruno")).await;

        // Written by another session of the same user
        let other = LocalStore::new(dir.path()).unwrap();
        other.delete(Some("ana"), "1").await.unwrap();

        for user_id in ["ana", "bruno", "carla"] {
            tx.send(SessionEvent::SignedIn {
                user_id: user_id.to_string(),
            })
            .unwrap();
        }
        drop(tx);
        watcher.await.unwrap();

        assert_eq!(registry.len().await, 2);
        let after = registry.get(Some("ana")).await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.ledger.lock().await.len(), 3);
        assert!(!registry.get(Some("bruno")).await.ledger.lock().await.is_loaded());
    }
}
