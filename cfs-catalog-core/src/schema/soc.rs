//! SoC catalog entry schema

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FieldDef, FieldKind, PathSegment, SchemaError, SchemaIssue, Validator};

const ACCESS_TAG: FieldKind = FieldKind::Object(&[
    FieldDef::optional("read", FieldKind::Array(&FieldKind::Str)),
    FieldDef::optional("write", FieldKind::Array(&FieldKind::Str)),
]);

const FAMILY: FieldKind = FieldKind::Object(&[
    FieldDef::required("id", FieldKind::Str),
    FieldDef::required("name", FieldKind::Str),
]);

const CORE_TYPE: FieldKind = FieldKind::Object(&[
    FieldDef::required("id", FieldKind::Str),
    FieldDef::required("architecture", FieldKind::Str),
    FieldDef::required("isa", FieldKind::Str),
    FieldDef::optional("description", FieldKind::Str),
]);

const CORE: FieldKind = FieldKind::Object(&[
    FieldDef::required("id", FieldKind::Str),
    FieldDef::required("name", FieldKind::Str),
    FieldDef::required("socID", FieldKind::Str),
    FieldDef::required("primary", FieldKind::Bool),
    FieldDef::required("coreType", CORE_TYPE),
    FieldDef::required("extensions", FieldKind::Array(&FieldKind::Str)),
    FieldDef::required("dataModelCoreID", FieldKind::Str),
    FieldDef::optional("description", FieldKind::Str),
    FieldDef::optional("supportsTrustZone", FieldKind::Bool),
    FieldDef::optional("accessTag", ACCESS_TAG),
]);

const BOARD: FieldKind = FieldKind::Object(&[
    FieldDef::required("id", FieldKind::Str),
    FieldDef::required("name", FieldKind::Str),
    FieldDef::required("description", FieldKind::Str),
    FieldDef::required("socID", FieldKind::Str),
    FieldDef::required("packageIDs", FieldKind::Array(&FieldKind::Str)),
    FieldDef::optional("productUrl", FieldKind::Str),
    FieldDef::optional("accessTag", ACCESS_TAG),
]);

const PACKAGE: FieldKind = FieldKind::Object(&[
    FieldDef::required("id", FieldKind::Str),
    FieldDef::required("name", FieldKind::Str),
    FieldDef::required("description", FieldKind::Str),
    FieldDef::required("socID", FieldKind::Str),
    FieldDef::required(
        "packageType",
        FieldKind::Enum(&["WLP", "TQFN", "TQFP", "CTBGA", "CSBGA", "BGAED"]),
    ),
    FieldDef::optional("accessTag", ACCESS_TAG),
]);

const DOCUMENTATION: FieldKind = FieldKind::Object(&[
    FieldDef::required("name", FieldKind::Str),
    FieldDef::required("url", FieldKind::Str),
    FieldDef::required(
        "categories",
        FieldKind::Array(&FieldKind::Enum(&["home", "dashboard"])),
    ),
]);

const MEDIA: FieldKind = FieldKind::Object(&[
    FieldDef::required("name", FieldKind::Str),
    FieldDef::required("url", FieldKind::Str),
    FieldDef::required(
        "mediaType",
        FieldKind::Enum(&["article", "video", "tutorial"]),
    ),
    FieldDef::optional("thumbnail", FieldKind::Str),
]);

/// Top-level fields of a catalog entry
pub static SOC_FIELDS: &[FieldDef] = &[
    FieldDef::required("id", FieldKind::Str),
    FieldDef::required("name", FieldKind::Str),
    FieldDef::required("description", FieldKind::Str),
    FieldDef::required("family", FAMILY),
    FieldDef::required("cores", FieldKind::Array(&CORE)),
    FieldDef::required("boards", FieldKind::Array(&BOARD)),
    FieldDef::required("packages", FieldKind::Array(&PACKAGE)),
    FieldDef::optional("documentation", FieldKind::Array(&DOCUMENTATION)),
    FieldDef::optional("media", FieldKind::Array(&MEDIA)),
    FieldDef::optional("accessTag", ACCESS_TAG),
];

/// A validated SoC catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Soc {
    pub id: String,
    pub name: String,
    pub description: String,
    pub family: SocFamily,
    pub cores: Vec<CorePart>,
    pub boards: Vec<Board>,
    pub packages: Vec<Package>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<Vec<Documentation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<Media>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tag: Option<AccessTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocFamily {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorePart {
    pub id: String,
    pub name: String,
    #[serde(rename = "socID")]
    pub soc_id: String,
    pub primary: bool,
    pub core_type: CoreType,
    pub extensions: Vec<String>,
    #[serde(rename = "dataModelCoreID")]
    pub data_model_core_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_trust_zone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tag: Option<AccessTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreType {
    pub id: String,
    pub architecture: String,
    pub isa: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "socID")]
    pub soc_id: String,
    #[serde(rename = "packageIDs")]
    pub package_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tag: Option<AccessTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageType {
    Wlp,
    Tqfn,
    Tqfp,
    Ctbga,
    Csbga,
    Bgaed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "socID")]
    pub soc_id: String,
    pub package_type: PackageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tag: Option<AccessTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentationCategory {
    Home,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub name: String,
    pub url: String,
    pub categories: Vec<DocumentationCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Article,
    Video,
    Tutorial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub name: String,
    pub url: String,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<Vec<String>>,
}

/// One row of [`crate::SocCatalog::summary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub family_name: String,
}

impl Soc {
    pub fn summary(&self) -> SocSummary {
        SocSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            family_name: self.family.name.clone(),
        }
    }
}

/// Validate one raw entry
pub fn validate_soc(item: &Value) -> Result<Soc, SchemaError> {
    let mut validator = Validator::new();
    let shaped = shape_soc(&mut validator, item);
    validator.finish()?;
    match shaped {
        Some(shaped) => into_soc(shaped, Vec::new()),
        None => Err(SchemaError { issues: vec![] }),
    }
}

/// Validate a batch of raw entries, reporting issues for all of them.
///
/// Issue paths start with the index of the offending entry. Duplicate ids
/// are not a schema violation.
pub fn validate_socs(items: &[Value]) -> Result<Vec<Soc>, SchemaError> {
    let mut validator = Validator::new();
    let mut shaped = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        validator.push(PathSegment::Index(idx));
        if let Some(v) = shape_soc(&mut validator, item) {
            shaped.push(v);
        }
        validator.pop();
    }
    validator.finish()?;

    shaped
        .into_iter()
        .enumerate()
        .map(|(idx, v)| into_soc(v, vec![PathSegment::Index(idx)]))
        .collect()
}

/// Structural check followed by the `socID` consistency check, which only
/// runs on an entry that is otherwise valid
fn shape_soc(validator: &mut Validator, item: &Value) -> Option<Value> {
    let shaped = validator.check(item, &FieldKind::Object(SOC_FIELDS))?;
    let id = shaped.get("id").and_then(Value::as_str)?.to_string();

    let before = validator.issue_count();
    check_soc_ids(validator, &shaped, &id);
    (validator.issue_count() == before).then_some(shaped)
}

/// Every nested `socID` must equal the owning entry's id and every nested
/// `socIDs` list must contain it
fn check_soc_ids(validator: &mut Validator, value: &Value, parent_id: &str) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                validator.push(PathSegment::Key(key.clone()));
                match (key.as_str(), child) {
                    ("socID", Value::String(soc_id)) if soc_id != parent_id => {
                        validator.issue(format!(
                            "socID '{soc_id}' does not match the parent id '{parent_id}'"
                        ));
                    }
                    ("socIDs", Value::Array(ids))
                        if !ids.iter().any(|id| id.as_str() == Some(parent_id)) =>
                    {
                        validator.issue(format!(
                            "socIDs does not contain the parent id '{parent_id}'"
                        ));
                    }
                    _ => check_soc_ids(validator, child, parent_id),
                }
                validator.pop();
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                validator.push(PathSegment::Index(idx));
                check_soc_ids(validator, child, parent_id);
                validator.pop();
            }
        }
        _ => {}
    }
}

fn into_soc(shaped: Value, path: Vec<PathSegment>) -> Result<Soc, SchemaError> {
    serde_json::from_value(shaped).map_err(|e| SchemaError {
        issues: vec![SchemaIssue {
            path,
            message: e.to_string(),
        }],
    })
}
