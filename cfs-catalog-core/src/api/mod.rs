//! Remote catalog API
//!
//! [`RemoteApiClient`] is the seam between the catalog and the service it
//! synchronizes from. The catalog only needs two calls: a listing of entry
//! summaries and the full record of one entry. Implementations:
//! - [`CfsApiClient`] (HTTP, behind the `api` feature)
//! - test doubles

#[cfg(feature = "api")]
mod http;

#[cfg(feature = "api")]
pub use http::CfsApiClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LIB_VERSION;

/// Summary of one remote entry, as returned by the listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocListing {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Source of catalog entries
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    /// Summaries of every available entry
    async fn list_socs(&self) -> Result<Vec<SocListing>>;

    /// Full, unvalidated record of one entry
    async fn get_soc(&self, id: &str) -> Result<Value>;

    /// Client identifier for logging
    fn name(&self) -> &'static str;
}

/// Connection settings for [`CfsApiClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOptions {
    /// Base URL all request paths are resolved against
    pub base_url: String,

    /// Environment variable holding an API key. When the variable is unset
    /// the client uses anonymous access.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Value of the `cfsVersion` query parameter
    #[serde(default = "default_cfs_version")]
    pub cfs_version: String,
}

fn default_api_key_env() -> String {
    "CFS_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("cfs-catalog-core/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_cfs_version() -> String {
    LIB_VERSION.to_string()
}

impl ApiOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            cfs_version: default_cfs_version(),
        }
    }
}
