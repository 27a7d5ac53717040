//! Catalog configuration
//!
//! [`StorageOptions`] is what [`super::SocCatalog::new`] takes. It can be
//! built in code or derived from a [`CatalogSettings`] file:
//!
//! ```yaml
//! directory: /var/lib/cfs/catalog   # relative paths resolve against the file
//! clean_tmp: true
//! fetch_concurrency: 8
//! api:
//!   base_url: https://api.example.com/v1
//!   api_key_env: CFS_API_KEY
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::ApiOptions;
use crate::store::{JsonFileStorage, StoreConstructor};

const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Where and how the catalog persists its entries
#[derive(Clone)]
pub struct StorageOptions {
    /// Root directory; stores are created beneath it
    pub directory: PathBuf,
    /// Opens the primary and staging stores
    pub storage: Arc<dyn StoreConstructor>,
    /// Remove the staging store on dispose
    pub clean_tmp: bool,
    /// Maximum number of entry details fetched at once during refresh
    pub fetch_concurrency: usize,
}

impl StorageOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            storage: Arc::new(JsonFileStorage),
            clean_tmp: false,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_storage(mut self, storage: impl StoreConstructor + 'static) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    pub fn with_clean_tmp(mut self, clean_tmp: bool) -> Self {
        self.clean_tmp = clean_tmp;
        self
    }

    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("directory", &self.directory)
            .field("clean_tmp", &self.clean_tmp)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish_non_exhaustive()
    }
}

/// File-based catalog settings (YAML or JSON)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub directory: PathBuf,

    #[serde(default)]
    pub clean_tmp: bool,

    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Remote API; absent means offline mode
    #[serde(default)]
    pub api: Option<ApiOptions>,
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

impl CatalogSettings {
    /// Load settings from a YAML or JSON file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog settings: {path:?}"))?;

        let mut settings: Self = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse catalog settings: {path:?}"))?;

        if settings.directory.is_relative() {
            if let Some(parent) = path.parent() {
                settings.directory = parent.join(&settings.directory);
            }
        }

        tracing::debug!(
            "Loaded catalog settings from {:?} (directory {:?}, online: {})",
            path,
            settings.directory,
            settings.api.is_some()
        );
        Ok(settings)
    }

    /// Storage options using the default file-backed store
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions::new(&self.directory)
            .with_clean_tmp(self.clean_tmp)
            .with_fetch_concurrency(self.fetch_concurrency)
    }

    /// HTTP client for the configured API, if any
    #[cfg(feature = "api")]
    pub fn api_client(&self) -> Result<Option<crate::api::CfsApiClient>> {
        self.api
            .clone()
            .map(crate::api::CfsApiClient::new)
            .transpose()
    }
}
