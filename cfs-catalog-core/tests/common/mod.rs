//! Test helpers for integration tests
//!
//! Shared across the test files using the tests/common/ pattern: logging
//! setup, catalog fixtures, mock data stores and a mock remote API.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use cfs_catalog_core::{
    DataStore, DataStoreError, DataStoreErrorKind, RemoteApiClient, SocCatalog, SocListing,
    StorageOptions, StoreConstructor, StoreItem, LIB_NAME, LIB_VERSION,
};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// A valid catalog entry
pub fn soc(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("{id}Name"),
        "description": format!("{id}Desc"),
        "family": { "id": "familyId", "name": "familyName" },
        "cores": [{
            "id": "core0",
            "name": "coreName",
            "primary": false,
            "socID": id,
            "coreType": { "architecture": "arch", "description": "desc", "id": "id", "isa": "isa" },
            "extensions": ["ext"],
            "dataModelCoreID": "CM0"
        }],
        "boards": [],
        "packages": [],
        "documentation": [],
        "media": []
    })
}

/// Named sets of valid entries
pub fn dataset(key: &str) -> Vec<Value> {
    match key {
        "valid" => vec![soc("soc1Id"), soc("soc2Id")],
        "reordered" => vec![soc("soc2Id"), soc("soc1Id")],
        "updated" => {
            let mut first = soc("soc1Id");
            first["description"] = json!("soc1Desc, revised");
            vec![first, soc("soc2Id")]
        }
        "extra_entry" => vec![soc("soc1Id"), soc("soc2Id"), soc("soc3Id")],
        "next" => vec![soc("soc2Id"), soc("soc3Id")],
        "extra_keys" => {
            let mut first = soc("soc1Id");
            first["vendorNotes"] = json!({ "internal": true });
            first["cores"][0]["debugOnly"] = json!("yes");
            vec![first, soc("soc2Id")]
        }
        other => panic!("unknown dataset: {other}"),
    }
}

/// Invalid entry sets and the number of schema issues each produces
pub const BAD_SCHEMA_CASES: &[(&str, usize)] = &[
    ("wrong_prop_type", 1),
    ("missing_prop", 1),
    ("duplicate_id", 0),
    ("child_wrong_prop_type", 1),
    ("wrong_array_type", 1),
    ("deep_missing_props", 2),
    ("mismatched_child_id", 1),
];

pub fn bad_dataset(key: &str) -> Vec<Value> {
    let mut item = soc("soc1Id");
    match key {
        "wrong_prop_type" => item["name"] = json!(123),
        "missing_prop" => {
            item.as_object_mut().unwrap().remove("name");
        }
        "duplicate_id" => return vec![soc("soc1Id"), soc("soc1Id")],
        "child_wrong_prop_type" => item["cores"][0]["name"] = json!(123),
        "wrong_array_type" => item["cores"][0]["extensions"] = json!([4]),
        "deep_missing_props" => {
            item["cores"][0]["coreType"] = json!({ "architecture": "arch", "description": "desc" })
        }
        "mismatched_child_id" => item["cores"][0]["socID"] = json!("wrongId"),
        other => panic!("unknown bad dataset: {other}"),
    }
    vec![item]
}

/// Invalid metadata and the number of schema issues each produces
pub const BAD_METADATA_CASES: &[(&str, usize)] = &[("wrong_prop_type", 1), ("invalid", 1)];

pub fn metadata(key: &str) -> Option<Value> {
    match key {
        "valid" => Some(json!({
            "data": {
                "fetchedAt": "2021-01-01T00:00:00.000Z",
                "libName": LIB_NAME,
                "libVersion": LIB_VERSION
            }
        })),
        "updated" => Some(json!({
            "data": {
                "fetchedAt": "2025-05-05T00:00:00.000Z",
                "libName": "my-lib",
                "libVersion": "2.0.0"
            }
        })),
        "extra_prop" => Some(json!({
            "data": {
                "fetchedAt": "2021-01-01T00:00:00.000Z",
                "libName": LIB_NAME,
                "libVersion": LIB_VERSION,
                "myNewProperty": "myNewValue"
            }
        })),
        "wrong_prop_type" => Some(json!({
            "data": {
                "fetchedAt": 12345,
                "libName": LIB_NAME,
                "libVersion": LIB_VERSION
            }
        })),
        "invalid" => Some(json!([])),
        "empty" => None,
        other => panic!("unknown metadata: {other}"),
    }
}

pub fn store_items(values: Vec<Value>) -> Vec<StoreItem> {
    values
        .into_iter()
        .map(|v| StoreItem::from_value(v).unwrap())
        .collect()
}

/// Entries sorted by id, for order-independent comparisons
pub fn sorted_by_id(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    values
}

// ============================================================================
// Mock data stores
// ============================================================================

#[derive(Default)]
struct MockState {
    items: Mutex<Vec<StoreItem>>,
    metadata: Mutex<Option<Value>>,
    closed: AtomicBool,
    destroyed: AtomicBool,
    fail_close: AtomicBool,
    fail_destroy: AtomicBool,
}

/// In-memory store that accepts anything and records its lifecycle.
///
/// Clones share state, so a test can keep a handle to the store it gave the
/// catalog.
#[derive(Clone, Default)]
pub struct MockDataStore {
    state: Arc<MockState>,
}

impl MockDataStore {
    /// Put contents in place without going through the catalog
    pub fn seed(&self, items: Vec<Value>, metadata: Option<Value>) {
        *self.state.items.lock().unwrap() = store_items(items);
        *self.state.metadata.lock().unwrap() = metadata;
    }

    pub fn raw_items(&self) -> Vec<Value> {
        self.state
            .items
            .lock()
            .unwrap()
            .iter()
            .map(StoreItem::to_value)
            .collect()
    }

    pub fn raw_metadata(&self) -> Option<Value> {
        self.state.metadata.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    pub fn fail_close(&self) {
        self.state.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn fail_destroy(&self) {
        self.state.fail_destroy.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataStore for MockDataStore {
    fn item_tag(&self) -> &str {
        "soc"
    }

    async fn get(&self, id: &str) -> Result<Option<StoreItem>, DataStoreError> {
        Ok(self
            .state
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id == id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<StoreItem>, DataStoreError> {
        Ok(self.state.items.lock().unwrap().clone())
    }

    async fn set(&self, items: Vec<StoreItem>) -> Result<(), DataStoreError> {
        let mut stored = self.state.items.lock().unwrap();
        for item in items {
            match stored.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item,
                None => stored.push(item),
            }
        }
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, DataStoreError> {
        Ok(self.state.items.lock().unwrap().is_empty())
    }

    async fn purge(&self) -> Result<(), DataStoreError> {
        self.state.items.lock().unwrap().clear();
        *self.state.metadata.lock().unwrap() = None;
        Ok(())
    }

    async fn replace(&self, incoming: &dyn DataStore) -> Result<(), DataStoreError> {
        let items = incoming.list().await?;
        let metadata = incoming.get_metadata().await?;
        *self.state.items.lock().unwrap() = items;
        *self.state.metadata.lock().unwrap() = metadata;
        Ok(())
    }

    async fn get_metadata(&self) -> Result<Option<Value>, DataStoreError> {
        Ok(self.state.metadata.lock().unwrap().clone())
    }

    async fn set_metadata(&self, metadata: Option<Value>) -> Result<(), DataStoreError> {
        *self.state.metadata.lock().unwrap() = metadata;
        Ok(())
    }

    async fn validate(&self) -> Result<(), DataStoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DataStoreError> {
        self.state.closed.store(true, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(DataStoreError::io("close failed"));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), DataStoreError> {
        if self.state.fail_destroy.load(Ordering::SeqCst) {
            return Err(DataStoreError::io("destroy failed"));
        }
        self.state.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Store constructor handing out [`MockDataStore`]s; the catalog opens its
/// primary store first and its staging store second
#[derive(Clone, Default)]
pub struct MockStorage {
    opened: Arc<Mutex<Vec<MockDataStore>>>,
}

impl MockStorage {
    pub fn primary(&self) -> MockDataStore {
        self.opened.lock().unwrap()[0].clone()
    }

    pub fn temp(&self) -> MockDataStore {
        self.opened.lock().unwrap()[1].clone()
    }
}

impl StoreConstructor for MockStorage {
    fn open(
        &self,
        _directory: &Path,
        _item_tag: &str,
    ) -> Result<Box<dyn DataStore>, DataStoreError> {
        let store = MockDataStore::default();
        self.opened.lock().unwrap().push(store.clone());
        Ok(Box::new(store))
    }
}

/// Store whose every operation fails with the given kind
pub struct ErroringDataStore {
    kind: DataStoreErrorKind,
}

impl ErroringDataStore {
    fn err(&self) -> DataStoreError {
        match self.kind {
            DataStoreErrorKind::IoError => DataStoreError::io("mock I/O failure"),
            DataStoreErrorKind::InvalidData => DataStoreError::invalid_data("mock invalid data"),
        }
    }
}

#[async_trait]
impl DataStore for ErroringDataStore {
    fn item_tag(&self) -> &str {
        "soc"
    }

    async fn get(&self, _id: &str) -> Result<Option<StoreItem>, DataStoreError> {
        Err(self.err())
    }

    async fn list(&self) -> Result<Vec<StoreItem>, DataStoreError> {
        Err(self.err())
    }

    async fn set(&self, _items: Vec<StoreItem>) -> Result<(), DataStoreError> {
        Err(self.err())
    }

    async fn is_empty(&self) -> Result<bool, DataStoreError> {
        Err(self.err())
    }

    async fn purge(&self) -> Result<(), DataStoreError> {
        Err(self.err())
    }

    async fn replace(&self, _incoming: &dyn DataStore) -> Result<(), DataStoreError> {
        Err(self.err())
    }

    async fn get_metadata(&self) -> Result<Option<Value>, DataStoreError> {
        Err(self.err())
    }

    async fn set_metadata(&self, _metadata: Option<Value>) -> Result<(), DataStoreError> {
        Err(self.err())
    }

    async fn validate(&self) -> Result<(), DataStoreError> {
        Err(self.err())
    }

    async fn close(&self) -> Result<(), DataStoreError> {
        Err(self.err())
    }

    async fn destroy(&self) -> Result<(), DataStoreError> {
        Err(self.err())
    }
}

#[derive(Clone, Copy)]
pub struct ErroringStorage(pub DataStoreErrorKind);

impl StoreConstructor for ErroringStorage {
    fn open(
        &self,
        _directory: &Path,
        _item_tag: &str,
    ) -> Result<Box<dyn DataStore>, DataStoreError> {
        Ok(Box::new(ErroringDataStore { kind: self.0 }))
    }
}

// ============================================================================
// Mock remote API
// ============================================================================

/// Remote API serving a configurable entry set
#[derive(Default)]
pub struct MockApi {
    items: Mutex<Vec<Value>>,
    fail_list: AtomicBool,
    fail_get: AtomicBool,
    get_calls: AtomicUsize,
}

impl MockApi {
    pub fn serving(items: Vec<Value>) -> Arc<Self> {
        let api = Self::default();
        *api.items.lock().unwrap() = items;
        Arc::new(api)
    }

    pub fn set_items(&self, items: Vec<Value>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApiClient for MockApi {
    async fn list_socs(&self) -> Result<Vec<SocListing>> {
        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("mock listing failure");
        }
        let text = |v: &Value| v.as_str().unwrap_or_default().to_string();
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .map(|item| SocListing {
                id: text(&item["id"]),
                name: text(&item["name"]),
                description: text(&item["description"]),
            })
            .collect())
    }

    async fn get_soc(&self, id: &str) -> Result<Value> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            anyhow::bail!("mock detail failure for {id}");
        }
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item["id"] == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no SoC {id}"))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ============================================================================
// Catalog and archive helpers
// ============================================================================

pub fn online_catalog(dir: &Path, storage: &MockStorage, api: &Arc<MockApi>) -> SocCatalog {
    let client: Arc<dyn RemoteApiClient> = api.clone();
    SocCatalog::new(
        StorageOptions::new(dir).with_storage(storage.clone()),
        Some(client),
    )
    .unwrap()
}

pub fn offline_catalog(dir: &Path, storage: &MockStorage) -> SocCatalog {
    SocCatalog::new(StorageOptions::new(dir).with_storage(storage.clone()), None).unwrap()
}

pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, data) in members {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Single stored member carrying zip64 size fields
pub fn write_zip64_stored(path: &Path, name: &str, data: &[u8]) {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .large_file(true);
    writer.start_file(name, options).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
}

/// Overwrite every little-endian `u64` equal to `len` with `u64::MAX`, so the
/// zip64 fields claim an impossible member size
pub fn forge_zip64_sizes(path: &Path, len: u64) {
    let mut bytes = std::fs::read(path).unwrap();
    let needle = len.to_le_bytes();
    let mut patched = 0;
    let mut i = 0;
    while i + needle.len() <= bytes.len() {
        if bytes[i..i + needle.len()] == needle {
            bytes[i..i + needle.len()].copy_from_slice(&u64::MAX.to_le_bytes());
            patched += 1;
            i += needle.len();
        } else {
            i += 1;
        }
    }
    assert!(patched > 0, "no zip64 size field found");
    std::fs::write(path, bytes).unwrap();
}

pub fn read_zip_member(path: &Path, name: &str) -> Option<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).ok()?;
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    Some(content)
}

pub fn zip_member_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}
