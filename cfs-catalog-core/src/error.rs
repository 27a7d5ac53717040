//! Error types for catalog and data store operations
//!
//! `CatalogError` is the only error surfaced by [`crate::SocCatalog`]. Its
//! [`CatalogError::kind`] tells callers which family of failure occurred, and
//! the `#[source]` chain carries the underlying cause: a [`DataStoreError`],
//! a transport error from the remote client, a [`ContentError`], or a raw
//! error for anything unexpected.

use std::fmt;
use thiserror::Error;

use crate::schema::SchemaError;

/// Boxed error used for causes that come from outside this crate
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Category of a [`CatalogError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogErrorKind {
    PersistenceError,
    ServiceError,
    InvalidContents,
    InvalidData,
    UnhandledException,
}

impl CatalogErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogErrorKind::PersistenceError => "PERSISTENCE_ERROR",
            CatalogErrorKind::ServiceError => "SERVICE_ERROR",
            CatalogErrorKind::InvalidContents => "INVALID_CONTENTS",
            CatalogErrorKind::InvalidData => "INVALID_DATA",
            CatalogErrorKind::UnhandledException => "UNHANDLED_EXCEPTION",
        }
    }
}

impl fmt::Display for CatalogErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the SoC catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A data store could not be created or an operation on it failed
    #[error("Encountered an error during a data store operation")]
    Persistence {
        #[source]
        source: DataStoreError,
    },

    /// The remote API could not be reached or returned an error
    #[error("Error fetching items from the API")]
    Service {
        #[source]
        source: BoxError,
    },

    /// Catalog items or metadata do not satisfy the catalog schema
    #[error("{message}")]
    InvalidContents {
        message: String,
        #[source]
        source: ContentError,
    },

    /// An archive is malformed or doesn't contain catalog data
    #[error("Error importing zip file: {reason}")]
    InvalidData {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Anything else
    #[error("Unhandled exception occurred: {message}")]
    Unhandled {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl CatalogError {
    /// The failure category
    pub fn kind(&self) -> CatalogErrorKind {
        match self {
            CatalogError::Persistence { .. } => CatalogErrorKind::PersistenceError,
            CatalogError::Service { .. } => CatalogErrorKind::ServiceError,
            CatalogError::InvalidContents { .. } => CatalogErrorKind::InvalidContents,
            CatalogError::InvalidData { .. } => CatalogErrorKind::InvalidData,
            CatalogError::Unhandled { .. } => CatalogErrorKind::UnhandledException,
        }
    }

    pub(crate) fn service(err: anyhow::Error) -> Self {
        CatalogError::Service { source: err.into() }
    }

    pub(crate) fn invalid_item(source: SchemaError) -> Self {
        CatalogError::InvalidContents {
            message: "Error validating item".to_string(),
            source: ContentError::Schema(source),
        }
    }

    pub(crate) fn invalid_metadata(source: SchemaError) -> Self {
        CatalogError::InvalidContents {
            message: "Error validating catalog metadata".to_string(),
            source: ContentError::Schema(source),
        }
    }

    pub(crate) fn duplicate_id(id: &str) -> Self {
        CatalogError::InvalidContents {
            message: format!("Duplicate item id: {id}"),
            source: ContentError::DuplicateId { id: id.to_string() },
        }
    }

    pub(crate) fn invalid_data(reason: impl Into<String>, source: Option<BoxError>) -> Self {
        CatalogError::InvalidData {
            reason: reason.into(),
            source,
        }
    }

    pub(crate) fn unhandled(message: impl Into<String>, source: Option<BoxError>) -> Self {
        CatalogError::Unhandled {
            message: message.into(),
            source,
        }
    }

    /// The store error behind a `PersistenceError`
    pub fn data_store_error(&self) -> Option<&DataStoreError> {
        match self {
            CatalogError::Persistence { source } => Some(source),
            _ => None,
        }
    }

    /// The validator error behind an `InvalidContents` error, if the
    /// contents failed the schema (duplicate ids carry no validator error)
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            CatalogError::InvalidContents {
                source: ContentError::Schema(schema),
                ..
            } => Some(schema),
            _ => None,
        }
    }
}

impl From<DataStoreError> for CatalogError {
    fn from(source: DataStoreError) -> Self {
        CatalogError::Persistence { source }
    }
}

/// Why catalog contents were rejected
#[derive(Error, Debug)]
pub enum ContentError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Duplicate item id: {id}")]
    DuplicateId { id: String },
}

/// Category of a [`DataStoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataStoreErrorKind {
    IoError,
    InvalidData,
}

impl fmt::Display for DataStoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataStoreErrorKind::IoError => f.write_str("IO_ERROR"),
            DataStoreErrorKind::InvalidData => f.write_str("INVALID_DATA"),
        }
    }
}

/// Errors raised by [`crate::store::DataStore`] implementations
#[derive(Error, Debug)]
pub enum DataStoreError {
    /// Reading or writing the underlying storage failed
    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The stored or incoming data is corrupt or has the wrong shape
    #[error("{message}")]
    InvalidData {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl DataStoreError {
    pub fn kind(&self) -> DataStoreErrorKind {
        match self {
            DataStoreError::Io { .. } => DataStoreErrorKind::IoError,
            DataStoreError::InvalidData { .. } => DataStoreErrorKind::InvalidData,
        }
    }

    /// An I/O failure without an underlying `std::io::Error`
    pub fn io(message: impl Into<String>) -> Self {
        DataStoreError::Io {
            message: message.into(),
            source: None,
        }
    }

    pub fn io_with(message: impl Into<String>, source: std::io::Error) -> Self {
        DataStoreError::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        DataStoreError::InvalidData {
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_data_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DataStoreError::InvalidData {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}
