//! Pluggable persistence for catalog entries
//!
//! A [`DataStore`] holds a set of [`StoreItem`]s keyed by id plus a single
//! optional metadata blob. The catalog never talks to a concrete store; it is
//! handed a [`StoreConstructor`] and opens its primary and staging stores
//! through it.

mod json_file;
mod memory;

pub use json_file::{JsonFileStorage, JsonFileStore};
pub use memory::{MemoryStorage, MemoryStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::DataStoreError;

/// One stored catalog entry: a non-empty id plus arbitrary other fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoreItem {
    /// Convert a raw JSON record, requiring an object with a non-empty
    /// string `id`
    pub fn from_value(value: Value) -> Result<Self, DataStoreError> {
        let Value::Object(mut fields) = value else {
            return Err(DataStoreError::invalid_data("Store item is not an object"));
        };
        match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self { id, fields }),
            Some(Value::String(_)) => Err(DataStoreError::invalid_data(
                "Store item id must not be empty",
            )),
            Some(_) => Err(DataStoreError::invalid_data(
                "Store item id must be a string",
            )),
            None => Err(DataStoreError::invalid_data("Store item has no id")),
        }
    }

    /// The full record, `id` included
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert("id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// A string field, if present and a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Async key/value persistence for catalog entries.
///
/// Implementations use interior mutability so a store can be shared behind
/// `&self` while another store replaces its contents from it.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Name of the entry collection, e.g. `soc`
    fn item_tag(&self) -> &str;

    /// Entry with the given id; a missing id is not an error
    async fn get(&self, id: &str) -> Result<Option<StoreItem>, DataStoreError>;

    /// Every entry, in no particular order
    async fn list(&self) -> Result<Vec<StoreItem>, DataStoreError>;

    /// Insert or update entries by id; the last duplicate in a batch wins
    async fn set(&self, items: Vec<StoreItem>) -> Result<(), DataStoreError>;

    async fn is_empty(&self) -> Result<bool, DataStoreError>;

    /// Remove every entry and the metadata
    async fn purge(&self) -> Result<(), DataStoreError>;

    /// Replace entries and metadata with those of `incoming`, all or nothing
    async fn replace(&self, incoming: &dyn DataStore) -> Result<(), DataStoreError>;

    async fn get_metadata(&self) -> Result<Option<Value>, DataStoreError>;

    async fn set_metadata(&self, metadata: Option<Value>) -> Result<(), DataStoreError>;

    /// Check the integrity of the underlying storage
    async fn validate(&self) -> Result<(), DataStoreError>;

    /// Release resources; data is kept and calling twice is harmless.
    /// Dropping an unclosed store must not lose committed data.
    async fn close(&self) -> Result<(), DataStoreError>;

    /// Irreversibly remove the underlying storage
    async fn destroy(&self) -> Result<(), DataStoreError>;
}

/// Opens a [`DataStore`] in a directory
pub trait StoreConstructor: Send + Sync {
    fn open(&self, directory: &Path, item_tag: &str)
        -> Result<Box<dyn DataStore>, DataStoreError>;
}

impl<F> StoreConstructor for F
where
    F: Fn(&Path, &str) -> Result<Box<dyn DataStore>, DataStoreError> + Send + Sync,
{
    fn open(
        &self,
        directory: &Path,
        item_tag: &str,
    ) -> Result<Box<dyn DataStore>, DataStoreError> {
        self(directory, item_tag)
    }
}

/// In-memory contents shared by the bundled stores
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Snapshot {
    pub items: Vec<StoreItem>,
    pub metadata: Option<Value>,
}

impl Snapshot {
    pub fn get(&self, id: &str) -> Option<&StoreItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn upsert(&mut self, items: Vec<StoreItem>) {
        for item in items {
            match self.items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item,
                None => self.items.push(item),
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.metadata = None;
    }

    /// Read another store into a new snapshot, rejecting a store that holds
    /// a different kind of entry
    pub async fn read_from(
        item_tag: &str,
        incoming: &dyn DataStore,
    ) -> Result<Self, DataStoreError> {
        if incoming.item_tag() != item_tag {
            return Err(DataStoreError::invalid_data(format!(
                "Cannot replace '{}' items with '{}' items",
                item_tag,
                incoming.item_tag()
            )));
        }
        let items = incoming.list().await?;
        let metadata = incoming.get_metadata().await?;
        check_items(&items)?;
        check_metadata(metadata.as_ref())?;

        let mut snapshot = Snapshot::default();
        snapshot.upsert(items);
        snapshot.metadata = metadata;
        Ok(snapshot)
    }
}

pub(crate) fn check_items(items: &[StoreItem]) -> Result<(), DataStoreError> {
    if items.iter().any(|item| item.id.is_empty()) {
        return Err(DataStoreError::invalid_data(
            "Store item id must not be empty",
        ));
    }
    Ok(())
}

pub(crate) fn check_metadata(metadata: Option<&Value>) -> Result<(), DataStoreError> {
    match metadata {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(DataStoreError::invalid_data("Metadata must be an object")),
    }
}
