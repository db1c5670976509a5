//! Durable storage of the persisted state subset.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::protocol::PersistedState;
use storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[async_trait]
pub trait StatePersistence: Send + Sync {
    async fn load(&self) -> Result<Option<PersistedState>>;
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

pub struct DurableStatePersistence {
    store: Storage,
    storage_key: String,
}

impl DurableStatePersistence {
    pub async fn initialize(database_url: &str, storage_key: impl Into<String>) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize state storage at '{database_url}'"))?;
        Ok(Arc::new(Self::from_storage(store, storage_key)))
    }

    pub fn from_storage(store: Storage, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
        }
    }
}

#[async_trait]
impl StatePersistence for DurableStatePersistence {
    /// An undecodable record loads as absent and is overwritten by the next
    /// save. Database failures still propagate.
    async fn load(&self) -> Result<Option<PersistedState>> {
        match self.store.load_state(&self.storage_key).await {
            Err(err) if err.downcast_ref::<serde_json::Error>().is_some() => {
                warn!(
                    storage_key = %self.storage_key,
                    "ignoring unreadable persisted state: {err:#}"
                );
                Ok(None)
            }
            result => result,
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        self.store.save_state(&self.storage_key, state).await
    }
}

/// Volatile persistence used by tests and `--ephemeral` sessions.
#[derive(Default)]
pub struct MemoryStatePersistence {
    state: Mutex<Option<PersistedState>>,
    saves: Mutex<u32>,
    fail_with: Option<String>,
}

impl MemoryStatePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    pub fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::default()
        }
    }

    pub async fn stored(&self) -> Option<PersistedState> {
        self.state.lock().await.clone()
    }

    pub async fn save_count(&self) -> u32 {
        *self.saves.lock().await
    }
}

#[async_trait]
impl StatePersistence for MemoryStatePersistence {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        *self.state.lock().await = Some(state.clone());
        *self.saves.lock().await += 1;
        Ok(())
    }
}

/// Holds the last-written record so that configuration and auth updates can
/// each rewrite their own fields without clobbering the other's.
pub struct PersistedStateWriter {
    backend: Arc<dyn StatePersistence>,
    record: Mutex<PersistedState>,
}

impl PersistedStateWriter {
    pub async fn load(backend: Arc<dyn StatePersistence>) -> Result<Self> {
        let record = backend
            .load()
            .await
            .context("failed to load persisted state")?
            .unwrap_or_default();
        Ok(Self {
            backend,
            record: Mutex::new(record),
        })
    }

    pub async fn current(&self) -> PersistedState {
        self.record.lock().await.clone()
    }

    /// Applies `update` and writes the whole record. The lock is held across
    /// the write so records reach storage in mutation order. Storage failures
    /// are traced and returned; the in-memory record keeps the update.
    pub async fn update<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut record = self.record.lock().await;
        update(&mut record);
        match self.backend.save(&record).await {
            Ok(()) => {
                debug!(project = %record.project_name, "persisted state saved");
                Ok(())
            }
            Err(err) => {
                warn!("failed to persist state: {err:#}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/persistence_tests.rs"]
mod tests;
