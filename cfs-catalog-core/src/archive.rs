//! Zip archive exchange format
//!
//! A catalog archive is an ordinary zip file with a JSON member named
//! [`ZIP_FILE_MEMBER`]:
//!
//! ```json
//! {
//!   "soc": [ ... ],
//!   "metadata": { ... },
//!   "export": { "exportedAt": "...", "libName": "...", "libVersion": "..." }
//! }
//! ```
//!
//! Writing replaces only that member; every other member of an existing
//! archive is copied over unchanged (raw, without recompression).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{LIB_NAME, LIB_VERSION};

/// Archive member holding the catalog JSON
pub const ZIP_FILE_MEMBER: &str = "soc-catalog.json";

/// Largest catalog member accepted on import
pub const MAX_MEMBER_SIZE: u64 = 256 * 1024 * 1024;

/// Errors reading or writing a catalog archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to access archive")]
    Io(#[from] std::io::Error),

    #[error("Invalid zip archive")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to read {member} from zip file")]
    Corrupt {
        member: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing {0} in zip file")]
    MissingMember(String),

    #[error("Archive member is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data in zip file: {0}")]
    InvalidPayload(String),
}

impl ArchiveError {
    /// Whether the archive itself exists but holds unusable data
    pub fn is_invalid_data(&self) -> bool {
        matches!(
            self,
            ArchiveError::Zip(_)
                | ArchiveError::Corrupt { .. }
                | ArchiveError::MissingMember(_)
                | ArchiveError::Json(_)
                | ArchiveError::InvalidPayload(_)
        )
    }
}

/// Provenance of an exported archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub exported_at: String,
    pub lib_name: String,
    pub lib_version: String,
}

impl ExportRecord {
    pub fn now() -> Self {
        Self {
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            lib_name: LIB_NAME.to_string(),
            lib_version: LIB_VERSION.to_string(),
        }
    }
}

/// Decoded catalog member; items and metadata are still unvalidated
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivePayload {
    pub items: Vec<Value>,
    pub metadata: Option<Value>,
    pub export: Option<Value>,
}

impl ArchivePayload {
    /// Parse the member content. `item_tag` names the entry list.
    pub fn decode(bytes: &[u8], item_tag: &str) -> Result<Self, ArchiveError> {
        let document: Value = serde_json::from_slice(bytes)?;
        let Value::Object(mut document) = document else {
            return Err(ArchiveError::InvalidPayload(
                "catalog member is not a JSON object".to_string(),
            ));
        };

        let items = match document.remove(item_tag) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ArchiveError::InvalidPayload(format!(
                    "'{item_tag}' is not an array"
                )))
            }
            None => {
                return Err(ArchiveError::InvalidPayload(format!(
                    "no '{item_tag}' entry"
                )))
            }
        };

        let metadata = match document.remove("metadata") {
            None | Some(Value::Null) => None,
            Some(metadata) => Some(metadata),
        };

        Ok(Self {
            items,
            metadata,
            export: document.remove("export"),
        })
    }

    /// Serialize the member content; `metadata` is omitted when absent
    pub fn encode(&self, item_tag: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut document = Map::new();
        document.insert(item_tag.to_string(), Value::Array(self.items.clone()));
        if let Some(metadata) = &self.metadata {
            document.insert("metadata".to_string(), metadata.clone());
        }
        if let Some(export) = &self.export {
            document.insert("export".to_string(), export.clone());
        }
        Ok(serde_json::to_vec(&Value::Object(document))?)
    }
}

/// Read one member of the zip at `path`
pub fn read_member(path: &Path, member: &str) -> Result<Vec<u8>, ArchiveError> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ArchiveError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ArchiveError::Io(e),
    })?;

    let mut archive = ZipArchive::new(file)?;
    let mut entry = match archive.by_name(member) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArchiveError::MissingMember(member.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    // The header's size is not trusted for allocation.
    let mut content = Vec::new();
    (&mut entry)
        .take(MAX_MEMBER_SIZE + 1)
        .read_to_end(&mut content)
        .map_err(|source| ArchiveError::Corrupt {
            member: member.to_string(),
            source,
        })?;
    if content.len() as u64 > MAX_MEMBER_SIZE {
        return Err(ArchiveError::InvalidPayload(format!(
            "{member} exceeds {MAX_MEMBER_SIZE} bytes"
        )));
    }
    Ok(content)
}

/// Create or update the zip at `path` so that `member` holds `content`.
///
/// Parent directories are created as needed. The new archive is written to
/// a temp file next to `path` and moved into place once complete.
pub fn write_member(path: &Path, member: &str, content: &[u8]) -> Result<(), ArchiveError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut existing = if path.exists() {
        Some(ZipArchive::new(std::fs::File::open(path)?)?)
    } else {
        None
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    {
        let mut writer = ZipWriter::new(tmp.as_file_mut());

        if let Some(archive) = existing.as_mut() {
            for idx in 0..archive.len() {
                let entry = archive.by_index_raw(idx)?;
                if entry.name() == member {
                    continue;
                }
                tracing::debug!("Preserving archive member {}", entry.name());
                writer.raw_copy_file(entry)?;
            }
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(member, options)?;
        writer.write_all(content)?;
        writer.finish()?;
    }

    drop(existing);
    tmp.persist(path).map_err(|e| ArchiveError::Io(e.error))?;
    Ok(())
}
