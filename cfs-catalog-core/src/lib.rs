//! CFS catalog core library exports
//!
//! The SoC catalog engine: remote synchronization, schema validation,
//! pluggable local persistence and zip archive exchange.

pub mod api;
pub mod archive;
pub mod catalog;
pub mod error;
pub mod schema;
pub mod store;

pub use api::{ApiOptions, RemoteApiClient, SocListing};
#[cfg(feature = "api")]
pub use api::CfsApiClient;
pub use archive::ZIP_FILE_MEMBER;
pub use catalog::{CatalogSettings, SocCatalog, StorageOptions};
pub use error::{
    CatalogError, CatalogErrorKind, ContentError, DataStoreError, DataStoreErrorKind, Result,
};
pub use schema::{CatalogMetadata, SchemaError, SchemaIssue, Soc, SocSummary};
pub use store::{DataStore, JsonFileStore, MemoryStore, StoreConstructor, StoreItem};

/// Library name recorded in catalog and export metadata
pub const LIB_NAME: &str = env!("CARGO_PKG_NAME");

/// Library version recorded in catalog and export metadata
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");
