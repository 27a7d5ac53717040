//! Catalog metadata schema

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FieldDef, FieldKind, SchemaError, SchemaIssue, Validator};
use crate::{LIB_NAME, LIB_VERSION};

pub static METADATA_FIELDS: &[FieldDef] = &[FieldDef::optional(
    "data",
    FieldKind::Object(&[
        FieldDef::optional("fetchedAt", FieldKind::DateTime),
        FieldDef::optional("libName", FieldKind::NonEmptyStr),
        FieldDef::optional("libVersion", FieldKind::Semver),
    ]),
)];

/// Metadata stored alongside the catalog entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FetchRecord>,
}

/// When, and by which library version, the catalog was fetched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_version: Option<String>,
}

impl CatalogMetadata {
    /// Metadata for a catalog fetched right now by this library
    pub fn fetched_now() -> Self {
        Self {
            data: Some(FetchRecord {
                fetched_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                lib_name: Some(LIB_NAME.to_string()),
                lib_version: Some(LIB_VERSION.to_string()),
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Validate a raw metadata record, stripping unknown keys
pub fn validate_metadata(raw: &Value) -> Result<CatalogMetadata, SchemaError> {
    let mut validator = Validator::new();
    let shaped = validator.check(raw, &FieldKind::Object(METADATA_FIELDS));
    validator.finish()?;
    let shaped = shaped.unwrap_or(Value::Null);
    serde_json::from_value(shaped).map_err(|e| SchemaError {
        issues: vec![SchemaIssue {
            path: vec![],
            message: e.to_string(),
        }],
    })
}
