//! SoC Catalog - synchronized, validated local copy of the SoC catalog
//!
//! The catalog owns two data stores:
//!
//! ```text
//! <directory>/soc/db            ← primary store, what readers see
//! <directory>/soc/db.<id>.tmp   ← staging store, one per catalog instance
//! ```
//!
//! Every write path (refresh from the remote API, archive import) validates
//! the complete candidate snapshot first, stages it in the staging store,
//! and then swaps it into the primary store with a single
//! [`DataStore::replace`] call. Readers therefore see either the old or the
//! new snapshot, never a mix, and a failed write leaves the primary store
//! untouched.
//!
//! Without a [`RemoteApiClient`] the catalog runs offline: `refresh()` is a
//! no-op and `update_available()` is always false.

mod config;

pub use config::{CatalogSettings, StorageOptions};

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::RemoteApiClient;
use crate::archive::{self, ArchiveError, ArchivePayload, ExportRecord, ZIP_FILE_MEMBER};
use crate::error::{BoxError, CatalogError, DataStoreError, Result};
use crate::schema::{self, CatalogMetadata, Soc, SocSummary};
use crate::store::{DataStore, StoreItem};

/// Name of the entry collection in stores and archives
pub const ITEM_TAG: &str = "soc";

/// Local SoC catalog, optionally synchronized with a remote API
pub struct SocCatalog {
    primary: Box<dyn DataStore>,
    temp: Box<dyn DataStore>,
    client: Option<Arc<dyn RemoteApiClient>>,
    primary_dir: PathBuf,
    temp_dir: PathBuf,
    clean_tmp: bool,
    fetch_concurrency: usize,
}

impl SocCatalog {
    /// Open the catalog under `options.directory`.
    ///
    /// Both stores are opened here; a store that cannot be opened fails with
    /// a persistence error. If only the staging store fails, the primary store
    /// is closed in the background.
    pub fn new(options: StorageOptions, client: Option<Arc<dyn RemoteApiClient>>) -> Result<Self> {
        let root = options.directory.join(ITEM_TAG);
        let primary_dir = root.join("db");
        let temp_dir = root.join(format!("db.{}.tmp", Uuid::now_v7().simple()));

        let primary = options.storage.open(&primary_dir, ITEM_TAG)?;
        let temp = match options.storage.open(&temp_dir, ITEM_TAG) {
            Ok(temp) => temp,
            Err(e) => {
                close_detached(primary);
                return Err(e.into());
            }
        };

        debug!(
            "Opened SoC catalog at {:?} ({})",
            primary_dir,
            client
                .as_ref()
                .map(|c| format!("online via {}", c.name()))
                .unwrap_or_else(|| "offline".to_string())
        );

        Ok(Self {
            primary,
            temp,
            client,
            primary_dir,
            temp_dir,
            clean_tmp: options.clean_tmp,
            fetch_concurrency: options.fetch_concurrency.max(1),
        })
    }

    /// Directory of the primary store
    pub fn directory(&self) -> &Path {
        &self.primary_dir
    }

    /// Directory of the staging store
    pub fn temp_directory(&self) -> &Path {
        &self.temp_dir
    }

    /// Whether the catalog runs without a remote API
    pub fn is_offline(&self) -> bool {
        self.client.is_none()
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.primary.is_empty().await?)
    }

    /// Compare the remote listing against the stored entries.
    ///
    /// Entries are matched by id regardless of order; a difference in count,
    /// ids, names or descriptions means an update is available. Always false
    /// offline.
    pub async fn update_available(&self) -> Result<bool> {
        let Some(client) = &self.client else {
            return Ok(false);
        };

        let mut remote = client.list_socs().await.map_err(CatalogError::service)?;
        let mut local = self.primary.list().await?;

        if remote.len() != local.len() {
            debug!(
                "Update available: {} remote vs {} local entries",
                remote.len(),
                local.len()
            );
            return Ok(true);
        }

        remote.sort_by(|a, b| a.id.cmp(&b.id));
        local.sort_by(|a, b| a.id.cmp(&b.id));

        let changed = remote.iter().zip(&local).any(|(r, l)| {
            r.id != l.id
                || l.str_field("name") != Some(r.name.as_str())
                || l.str_field("description") != Some(r.description.as_str())
        });
        debug!("Update available: {}", changed);
        Ok(changed)
    }

    /// Replace the catalog with the current contents of the remote API.
    ///
    /// Nothing is written unless every fetched entry is valid. No-op offline.
    pub async fn refresh(&self) -> Result<()> {
        let Some(client) = &self.client else {
            debug!("Refresh skipped, catalog is offline");
            return Ok(());
        };
        let client = client.as_ref();

        let listings = client.list_socs().await.map_err(CatalogError::service)?;
        debug!(
            "Fetching {} SoC entries from {}",
            listings.len(),
            client.name()
        );

        let items: Vec<Value> = stream::iter(listings)
            .map(|listing| async move { client.get_soc(&listing.id).await })
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await
            .map_err(CatalogError::service)?;

        let count = items.len();
        self.stage_and_replace(items, Some(CatalogMetadata::fetched_now().to_value()))
            .await?;
        info!("Refreshed SoC catalog with {} entries", count);
        Ok(())
    }

    /// One validated entry, or `None` if the id is unknown
    pub async fn get(&self, id: &str) -> Result<Option<Soc>> {
        match self.primary.get(id).await? {
            Some(item) => Ok(Some(
                schema::validate_soc(&item.to_value()).map_err(CatalogError::invalid_item)?,
            )),
            None => Ok(None),
        }
    }

    /// Every entry, validated; fails if any stored entry is invalid
    pub async fn get_all(&self) -> Result<Vec<Soc>> {
        let items = self.primary.list().await?;
        ensure_unique_ids(items.iter().map(|item| item.id.as_str()))?;
        let raw: Vec<Value> = items.iter().map(StoreItem::to_value).collect();
        schema::validate_socs(&raw).map_err(CatalogError::invalid_item)
    }

    /// Id, name, description and family name of every entry
    pub async fn summary(&self) -> Result<Vec<SocSummary>> {
        Ok(self.get_all().await?.iter().map(Soc::summary).collect())
    }

    /// Remove every entry and the metadata
    pub async fn purge(&self) -> Result<()> {
        self.primary.purge().await?;
        self.temp.purge().await?;
        info!("Purged SoC catalog at {:?}", self.primary_dir);
        Ok(())
    }

    /// Validated catalog metadata, if any has been stored
    pub async fn get_metadata(&self) -> Result<Option<CatalogMetadata>> {
        match self.primary.get_metadata().await? {
            Some(raw) => Ok(Some(
                schema::validate_metadata(&raw).map_err(CatalogError::invalid_metadata)?,
            )),
            None => Ok(None),
        }
    }

    /// Check the primary store and every stored entry and the metadata
    pub async fn validate(&self) -> Result<()> {
        self.primary.validate().await?;
        self.get_all().await?;
        self.get_metadata().await?;
        Ok(())
    }

    /// Write the catalog to the zip archive at `path`.
    ///
    /// The catalog is validated before the archive is touched. Other members
    /// of an existing archive are kept.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        let items = self.get_all().await?;
        let metadata = self.get_metadata().await?;
        let payload = ArchivePayload {
            items: items
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<Value>, _>>()
                .map_err(serialize_error)?,
            metadata: metadata.as_ref().map(CatalogMetadata::to_value),
            export: Some(serde_json::to_value(ExportRecord::now()).map_err(serialize_error)?),
        };
        let content = payload.encode(ITEM_TAG).map_err(export_error)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || {
            archive::write_member(&target, ZIP_FILE_MEMBER, &content)
        })
        .await
        .map_err(|e| CatalogError::unhandled("Archive export task failed", Some(e.into())))?
        .map_err(export_error)?;

        info!("Exported {} SoC entries to {:?}", items.len(), path);
        Ok(())
    }

    /// Replace the catalog with the contents of the zip archive at `path`.
    ///
    /// Nothing is written unless the archive holds a valid catalog. Unknown
    /// entry fields are kept in storage.
    pub async fn import(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        let source = path.clone();
        let content =
            tokio::task::spawn_blocking(move || archive::read_member(&source, ZIP_FILE_MEMBER))
                .await
                .map_err(|e| {
                    CatalogError::unhandled("Archive import task failed", Some(e.into()))
                })?
                .map_err(import_error)?;

        let payload = ArchivePayload::decode(&content, ITEM_TAG).map_err(import_error)?;
        let count = payload.items.len();
        self.stage_and_replace(payload.items, payload.metadata)
            .await?;

        info!("Imported {} SoC entries from {:?}", count, path);
        Ok(())
    }

    /// Close both stores, removing the staging store if `clean_tmp` is set.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    pub async fn dispose(self) -> Result<()> {
        let mut results = vec![self.primary.close().await, self.temp.close().await];
        if self.clean_tmp {
            results.push(self.temp.destroy().await);
        }
        first_error(results, "dispose")
    }

    /// Close and irreversibly remove both stores
    pub async fn destroy(self) -> Result<()> {
        for result in [self.primary.close().await, self.temp.close().await] {
            if let Err(e) = result {
                warn!("Ignoring close failure while destroying SoC catalog: {}", e);
            }
        }
        let results = vec![self.primary.destroy().await, self.temp.destroy().await];
        first_error(results, "destroy")?;
        info!("Destroyed SoC catalog at {:?}", self.primary_dir);
        Ok(())
    }

    /// Validate a candidate snapshot, stage it, and swap it into the primary
    /// store
    async fn stage_and_replace(&self, items: Vec<Value>, metadata: Option<Value>) -> Result<()> {
        let validated = schema::validate_socs(&items).map_err(CatalogError::invalid_item)?;
        ensure_unique_ids(validated.iter().map(|soc| soc.id.as_str()))?;
        if let Some(raw) = &metadata {
            schema::validate_metadata(raw).map_err(CatalogError::invalid_metadata)?;
        }

        let items = items
            .into_iter()
            .map(StoreItem::from_value)
            .collect::<std::result::Result<Vec<_>, DataStoreError>>()?;

        self.temp.purge().await?;
        self.temp.set(items).await?;
        self.temp.set_metadata(metadata).await?;
        self.primary.replace(self.temp.as_ref()).await?;
        Ok(())
    }
}

/// Close a store from synchronous code. Outside a tokio runtime the store is
/// only dropped.
fn close_detached(store: Box<dyn DataStore>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = store.close().await {
                    warn!("Failed to close store after aborted catalog open: {}", e);
                }
            });
        }
        Err(_) => debug!("No runtime to close store after aborted catalog open, dropping it"),
    }
}

fn ensure_unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::duplicate_id(id));
        }
    }
    Ok(())
}

fn serialize_error(err: serde_json::Error) -> CatalogError {
    CatalogError::unhandled("Failed to serialize catalog", Some(err.into()))
}

/// Export failures are always unhandled, even for an unreadable existing archive
fn export_error(err: ArchiveError) -> CatalogError {
    CatalogError::unhandled(
        format!("Error exporting zip file: {err}"),
        Some(Box::new(err) as BoxError),
    )
}

fn import_error(err: ArchiveError) -> CatalogError {
    if err.is_invalid_data() {
        let reason = err.to_string();
        CatalogError::invalid_data(reason, Some(Box::new(err) as BoxError))
    } else {
        CatalogError::unhandled(err.to_string(), Some(Box::new(err) as BoxError))
    }
}

fn first_error(
    results: Vec<std::result::Result<(), DataStoreError>>,
    operation: &str,
) -> Result<()> {
    let mut errors = results.into_iter().filter_map(|r| r.err());
    let Some(first) = errors.next() else {
        return Ok(());
    };
    for other in errors {
        warn!("Additional failure during SoC catalog {}: {}", operation, other);
    }
    Err(first.into())
}
