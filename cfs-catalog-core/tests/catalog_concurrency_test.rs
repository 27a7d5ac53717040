//! Readers running alongside refresh and import see either the previous or
//! the next snapshot, never a mix of both

mod common;

use cfs_catalog_core::{RemoteApiClient, SocCatalog, StorageOptions, ZIP_FILE_MEMBER};
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

const READERS: usize = 8;
const READS_PER_READER: usize = 40;
const WRITES: usize = 6;

async fn shaped_all(catalog: &SocCatalog) -> Vec<Value> {
    let all = catalog.get_all().await.unwrap();
    sorted_by_id(all.iter().map(|s| serde_json::to_value(s).unwrap()).collect())
}

fn spawn_readers(catalog: &Arc<SocCatalog>) -> Vec<JoinHandle<Vec<Vec<Value>>>> {
    (0..READERS)
        .map(|_| {
            let catalog = Arc::clone(catalog);
            tokio::spawn(async move {
                let mut seen = Vec::with_capacity(READS_PER_READER);
                for _ in 0..READS_PER_READER {
                    seen.push(shaped_all(&catalog).await);
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect()
}

async fn assert_whole_snapshots(readers: Vec<JoinHandle<Vec<Vec<Value>>>>) {
    let first = sorted_by_id(dataset("valid"));
    let second = sorted_by_id(dataset("next"));

    for reader in readers {
        for snapshot in reader.await.unwrap() {
            assert!(
                snapshot == first || snapshot == second,
                "reader saw a mixed snapshot: {snapshot:#?}"
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_during_refresh() {
    init_test_logging();
    let temp = TempDir::new().unwrap();
    let api = MockApi::serving(dataset("valid"));
    let client: Arc<dyn RemoteApiClient> = api.clone();
    let catalog =
        Arc::new(SocCatalog::new(StorageOptions::new(temp.path()), Some(client)).unwrap());
    catalog.refresh().await.unwrap();

    let readers = spawn_readers(&catalog);
    for round in 0..WRITES {
        api.set_items(dataset(if round % 2 == 0 { "next" } else { "valid" }));
        catalog.refresh().await.unwrap();
    }
    assert_whole_snapshots(readers).await;

    assert_eq!(shaped_all(&catalog).await, sorted_by_id(dataset("valid")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_during_import() {
    init_test_logging();
    let temp = TempDir::new().unwrap();

    let archives: Vec<_> = ["valid", "next"]
        .into_iter()
        .map(|key| {
            let path = temp.path().join(format!("{key}.zip"));
            let content = serde_json::to_vec(&json!({ "soc": dataset(key) })).unwrap();
            write_zip(&path, &[(ZIP_FILE_MEMBER, &content[..])]);
            path
        })
        .collect();

    let options = StorageOptions::new(temp.path().join("data"));
    let catalog = Arc::new(SocCatalog::new(options, None).unwrap());
    catalog.import(&archives[0]).await.unwrap();

    let readers = spawn_readers(&catalog);
    for round in 0..WRITES {
        catalog.import(&archives[(round + 1) % 2]).await.unwrap();
    }
    assert_whole_snapshots(readers).await;

    assert_eq!(shaped_all(&catalog).await, sorted_by_id(dataset("valid")));
}
