//! Volatile in-memory store

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::sync::RwLock;

use super::{check_items, check_metadata, DataStore, Snapshot, StoreConstructor, StoreItem};
use crate::error::DataStoreError;

#[derive(Debug, Default)]
struct State {
    snapshot: Snapshot,
    destroyed: bool,
}

/// A [`DataStore`] that keeps everything in memory
#[derive(Debug)]
pub struct MemoryStore {
    item_tag: String,
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new(item_tag: impl Into<String>) -> Self {
        Self {
            item_tag: item_tag.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Seed a store with entries and metadata
    pub fn with_contents(
        item_tag: impl Into<String>,
        items: Vec<StoreItem>,
        metadata: Option<Value>,
    ) -> Result<Self, DataStoreError> {
        check_items(&items)?;
        check_metadata(metadata.as_ref())?;
        let mut snapshot = Snapshot::default();
        snapshot.upsert(items);
        snapshot.metadata = metadata;
        Ok(Self {
            item_tag: item_tag.into(),
            state: RwLock::new(State {
                snapshot,
                destroyed: false,
            }),
        })
    }
}

fn ensure_live(state: &State) -> Result<(), DataStoreError> {
    if state.destroyed {
        return Err(DataStoreError::io("Data store has been destroyed"));
    }
    Ok(())
}

#[async_trait]
impl DataStore for MemoryStore {
    fn item_tag(&self) -> &str {
        &self.item_tag
    }

    async fn get(&self, id: &str) -> Result<Option<StoreItem>, DataStoreError> {
        let state = self.state.read().await;
        ensure_live(&state)?;
        Ok(state.snapshot.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<StoreItem>, DataStoreError> {
        let state = self.state.read().await;
        ensure_live(&state)?;
        Ok(state.snapshot.items.clone())
    }

    async fn set(&self, items: Vec<StoreItem>) -> Result<(), DataStoreError> {
        check_items(&items)?;
        let mut state = self.state.write().await;
        ensure_live(&state)?;
        state.snapshot.upsert(items);
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, DataStoreError> {
        let state = self.state.read().await;
        ensure_live(&state)?;
        Ok(state.snapshot.items.is_empty())
    }

    async fn purge(&self) -> Result<(), DataStoreError> {
        let mut state = self.state.write().await;
        ensure_live(&state)?;
        state.snapshot.clear();
        Ok(())
    }

    async fn replace(&self, incoming: &dyn DataStore) -> Result<(), DataStoreError> {
        let snapshot = Snapshot::read_from(&self.item_tag, incoming).await?;
        let mut state = self.state.write().await;
        ensure_live(&state)?;
        state.snapshot = snapshot;
        Ok(())
    }

    async fn get_metadata(&self) -> Result<Option<Value>, DataStoreError> {
        let state = self.state.read().await;
        ensure_live(&state)?;
        Ok(state.snapshot.metadata.clone())
    }

    async fn set_metadata(&self, metadata: Option<Value>) -> Result<(), DataStoreError> {
        check_metadata(metadata.as_ref())?;
        let mut state = self.state.write().await;
        ensure_live(&state)?;
        state.snapshot.metadata = metadata;
        Ok(())
    }

    async fn validate(&self) -> Result<(), DataStoreError> {
        let state = self.state.read().await;
        ensure_live(&state)
    }

    async fn close(&self) -> Result<(), DataStoreError> {
        Ok(())
    }

    async fn destroy(&self) -> Result<(), DataStoreError> {
        let mut state = self.state.write().await;
        state.snapshot.clear();
        state.destroyed = true;
        Ok(())
    }
}

/// Opens a fresh [`MemoryStore`], ignoring the directory
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStorage;

impl StoreConstructor for MemoryStorage {
    fn open(
        &self,
        _directory: &Path,
        item_tag: &str,
    ) -> Result<Box<dyn DataStore>, DataStoreError> {
        Ok(Box::new(MemoryStore::new(item_tag)))
    }
}
