//! File-backed store: one JSON document per store directory
//!
//! The document lives at `<directory>/<item_tag>-store.json` and has the
//! shape `{ "<item_tag>": [items...], "metadata": {...} }`. The whole
//! document is held in memory and rewritten on every mutation through a
//! temp file and a rename, so a crash never leaves a half-written file.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::{check_items, check_metadata, DataStore, Snapshot, StoreConstructor, StoreItem};
use crate::error::DataStoreError;

const METADATA_KEY: &str = "metadata";

#[derive(Debug, Default)]
struct State {
    snapshot: Snapshot,
    closed: bool,
    destroyed: bool,
}

/// A [`DataStore`] persisted as a single JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    item_tag: String,
    directory: PathBuf,
    path: PathBuf,
    state: RwLock<State>,
}

impl JsonFileStore {
    /// Open the store in `directory`, creating the directory and an empty
    /// document when they don't exist yet
    pub fn open(directory: &Path, item_tag: &str) -> Result<Self, DataStoreError> {
        let path = directory.join(format!("{item_tag}-store.json"));

        std::fs::create_dir_all(directory).map_err(|e| {
            DataStoreError::io_with(
                format!("Failed to create store directory {}", directory.display()),
                e,
            )
        })?;

        let snapshot = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                DataStoreError::io_with(format!("Failed to read {}", path.display()), e)
            })?;
            parse_document(&content, item_tag)?
        } else {
            let snapshot = Snapshot::default();
            std::fs::write(&path, render_document(&snapshot, item_tag)?).map_err(|e| {
                DataStoreError::io_with(format!("Failed to create {}", path.display()), e)
            })?;
            snapshot
        };

        tracing::debug!(
            "Opened {} store at {} with {} item(s)",
            item_tag,
            path.display(),
            snapshot.items.len()
        );

        Ok(Self {
            item_tag: item_tag.to_string(),
            directory: directory.to_path_buf(),
            path,
            state: RwLock::new(State {
                snapshot,
                ..Default::default()
            }),
        })
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self, state: &State) -> Result<(), DataStoreError> {
        if state.destroyed {
            return Err(DataStoreError::io(format!(
                "Data store at {} has been destroyed",
                self.directory.display()
            )));
        }
        if state.closed {
            return Err(DataStoreError::io(format!(
                "Data store at {} is closed",
                self.directory.display()
            )));
        }
        Ok(())
    }

    /// Write `snapshot` to disk, then make it the live state
    async fn commit(&self, state: &mut State, snapshot: Snapshot) -> Result<(), DataStoreError> {
        let content = render_document(&snapshot, &self.item_tag)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, content).await.map_err(|e| {
            DataStoreError::io_with(format!("Failed to write {}", tmp_path.display()), e)
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            DataStoreError::io_with(format!("Failed to replace {}", self.path.display()), e)
        })?;

        state.snapshot = snapshot;
        Ok(())
    }
}

fn parse_document(content: &str, item_tag: &str) -> Result<Snapshot, DataStoreError> {
    let document: Value = serde_json::from_str(content)
        .map_err(|e| DataStoreError::invalid_data_with("Store file is not valid JSON", e))?;

    let Value::Object(mut document) = document else {
        return Err(DataStoreError::invalid_data("Store file is not a JSON object"));
    };

    let items = match document.remove(item_tag) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(StoreItem::from_value)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(DataStoreError::invalid_data(format!(
                "Store file entry '{item_tag}' is not an array"
            )))
        }
        None => {
            return Err(DataStoreError::invalid_data(format!(
                "Store file has no '{item_tag}' entry"
            )))
        }
    };

    let metadata = match document.remove(METADATA_KEY) {
        None | Some(Value::Null) => None,
        Some(metadata) => Some(metadata),
    };
    check_metadata(metadata.as_ref())?;

    let mut snapshot = Snapshot::default();
    snapshot.upsert(items);
    snapshot.metadata = metadata;
    Ok(snapshot)
}

fn render_document(snapshot: &Snapshot, item_tag: &str) -> Result<String, DataStoreError> {
    let mut document = Map::new();
    document.insert(
        item_tag.to_string(),
        Value::Array(snapshot.items.iter().map(StoreItem::to_value).collect()),
    );
    if let Some(metadata) = &snapshot.metadata {
        document.insert(METADATA_KEY.to_string(), metadata.clone());
    }
    serde_json::to_string_pretty(&Value::Object(document))
        .map_err(|e| DataStoreError::invalid_data_with("Failed to serialize store", e))
}

#[async_trait]
impl DataStore for JsonFileStore {
    fn item_tag(&self) -> &str {
        &self.item_tag
    }

    async fn get(&self, id: &str) -> Result<Option<StoreItem>, DataStoreError> {
        let state = self.state.read().await;
        self.ensure_open(&state)?;
        Ok(state.snapshot.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<StoreItem>, DataStoreError> {
        let state = self.state.read().await;
        self.ensure_open(&state)?;
        Ok(state.snapshot.items.clone())
    }

    async fn set(&self, items: Vec<StoreItem>) -> Result<(), DataStoreError> {
        check_items(&items)?;
        let mut state = self.state.write().await;
        self.ensure_open(&state)?;
        let mut next = state.snapshot.clone();
        next.upsert(items);
        self.commit(&mut state, next).await
    }

    async fn is_empty(&self) -> Result<bool, DataStoreError> {
        let state = self.state.read().await;
        self.ensure_open(&state)?;
        Ok(state.snapshot.items.is_empty())
    }

    async fn purge(&self) -> Result<(), DataStoreError> {
        let mut state = self.state.write().await;
        self.ensure_open(&state)?;
        tracing::debug!("Purging {} store at {}", self.item_tag, self.path.display());
        self.commit(&mut state, Snapshot::default()).await
    }

    async fn replace(&self, incoming: &dyn DataStore) -> Result<(), DataStoreError> {
        let next = Snapshot::read_from(&self.item_tag, incoming).await?;
        let mut state = self.state.write().await;
        self.ensure_open(&state)?;
        tracing::debug!(
            "Replacing {} store at {} with {} item(s)",
            self.item_tag,
            self.path.display(),
            next.items.len()
        );
        self.commit(&mut state, next).await
    }

    async fn get_metadata(&self) -> Result<Option<Value>, DataStoreError> {
        let state = self.state.read().await;
        self.ensure_open(&state)?;
        Ok(state.snapshot.metadata.clone())
    }

    async fn set_metadata(&self, metadata: Option<Value>) -> Result<(), DataStoreError> {
        check_metadata(metadata.as_ref())?;
        let mut state = self.state.write().await;
        self.ensure_open(&state)?;
        let mut next = state.snapshot.clone();
        next.metadata = metadata;
        self.commit(&mut state, next).await
    }

    /// Re-read the document from disk and reload it
    async fn validate(&self) -> Result<(), DataStoreError> {
        let mut state = self.state.write().await;
        self.ensure_open(&state)?;
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DataStoreError::io_with(format!("Failed to read {}", self.path.display()), e)
        })?;
        state.snapshot = parse_document(&content, &self.item_tag)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DataStoreError> {
        let mut state = self.state.write().await;
        state.closed = true;
        Ok(())
    }

    /// Remove the store directory and everything in it
    async fn destroy(&self) -> Result<(), DataStoreError> {
        let mut state = self.state.write().await;
        if self.directory.exists() {
            tokio::fs::remove_dir_all(&self.directory)
                .await
                .map_err(|e| {
                    DataStoreError::io_with(
                        format!("Failed to remove {}", self.directory.display()),
                        e,
                    )
                })?;
        }
        tracing::debug!("Destroyed {} store at {}", self.item_tag, self.directory.display());
        state.snapshot.clear();
        state.destroyed = true;
        Ok(())
    }
}

/// Opens a [`JsonFileStore`]; the default storage of the catalog
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileStorage;

impl StoreConstructor for JsonFileStorage {
    fn open(
        &self,
        directory: &Path,
        item_tag: &str,
    ) -> Result<Box<dyn DataStore>, DataStoreError> {
        Ok(Box::new(JsonFileStore::open(directory, item_tag)?))
    }
}
