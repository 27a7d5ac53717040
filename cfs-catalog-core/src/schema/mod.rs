//! Structural schema validation for catalog content
//!
//! A schema is a static tree of [`FieldDef`]s. Validating a JSON value
//! against it walks the whole tree and records every violation as a
//! [`SchemaIssue`] instead of stopping at the first one, so callers get a
//! deterministic, complete list of problems for a given input. On success the
//! result is the *shaped* value: the same data with keys unknown to the schema
//! removed.

mod metadata;
mod soc;

pub use metadata::{validate_metadata, CatalogMetadata, FetchRecord, METADATA_FIELDS};
pub use soc::{
    validate_soc, validate_socs, AccessTag, Board, CorePart, CoreType, Documentation,
    DocumentationCategory, Media, MediaType, Package, PackageType, Soc, SocFamily, SocSummary,
    SOC_FIELDS,
};

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A single field in an object schema
#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDef {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// The expected type of a value
#[derive(Debug)]
pub enum FieldKind {
    Str,
    /// String with at least one character
    NonEmptyStr,
    Bool,
    /// RFC 3339 timestamp with an offset
    DateTime,
    /// Semantic version string
    Semver,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
    Array(&'static FieldKind),
    /// Object with the given fields; other keys are stripped
    Object(&'static [FieldDef]),
}

/// One step in the path to an offending value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl SchemaIssue {
    /// Dotted path, e.g. `0.cores.0.coreType.isa`
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path_string(), self.message)
        }
    }
}

/// All violations found while validating a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} schema violation(s): {}", .issues.len(), summarize(.issues))]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

fn summarize(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl SchemaError {
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Collects issues while walking a value
#[derive(Debug, Default)]
pub(crate) struct Validator {
    path: Vec<PathSegment>,
    issues: Vec<SchemaIssue>,
}

impl Validator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn issue(&mut self, message: impl Into<String>) {
        self.issues.push(SchemaIssue {
            path: self.path.clone(),
            message: message.into(),
        });
    }

    pub(crate) fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.path.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.path.pop();
    }

    pub(crate) fn finish(self) -> Result<(), SchemaError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(SchemaError {
                issues: self.issues,
            })
        }
    }

    /// Check `value` against `kind`, returning the shaped value when no
    /// issue was recorded for it
    pub(crate) fn check(&mut self, value: &Value, kind: &FieldKind) -> Option<Value> {
        match kind {
            FieldKind::Str => self.expect_str(value).map(|s| Value::String(s.to_string())),
            FieldKind::NonEmptyStr => {
                let s = self.expect_str(value)?;
                if s.is_empty() {
                    self.issue("String cannot be empty");
                    return None;
                }
                Some(Value::String(s.to_string()))
            }
            FieldKind::Bool => match value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                other => {
                    self.type_mismatch("boolean", other);
                    None
                }
            },
            FieldKind::DateTime => {
                let s = self.expect_str(value)?;
                if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                    self.issue("Invalid datetime");
                    return None;
                }
                Some(Value::String(s.to_string()))
            }
            FieldKind::Semver => {
                let s = self.expect_str(value)?;
                if parse_semver(s).is_none() {
                    self.issue("Value is not a valid semver");
                    return None;
                }
                Some(Value::String(s.to_string()))
            }
            FieldKind::Enum(options) => {
                let s = self.expect_str(value)?;
                if !options.contains(&s) {
                    self.issue(format!(
                        "Invalid enum value. Expected {}, received '{}'",
                        options
                            .iter()
                            .map(|o| format!("'{o}'"))
                            .collect::<Vec<_>>()
                            .join(" | "),
                        s
                    ));
                    return None;
                }
                Some(Value::String(s.to_string()))
            }
            FieldKind::Array(element) => {
                let Value::Array(items) = value else {
                    self.type_mismatch("array", value);
                    return None;
                };
                let before = self.issue_count();
                let mut shaped = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    self.push(PathSegment::Index(idx));
                    if let Some(v) = self.check(item, element) {
                        shaped.push(v);
                    }
                    self.pop();
                }
                (self.issue_count() == before).then_some(Value::Array(shaped))
            }
            FieldKind::Object(fields) => {
                let Value::Object(map) = value else {
                    self.type_mismatch("object", value);
                    return None;
                };
                self.check_fields(map, fields).map(Value::Object)
            }
        }
    }

    /// Check the known fields of an object, dropping unknown keys
    pub(crate) fn check_fields(
        &mut self,
        map: &Map<String, Value>,
        fields: &[FieldDef],
    ) -> Option<Map<String, Value>> {
        let before = self.issue_count();
        let mut shaped = Map::new();
        for field in fields {
            self.push(PathSegment::Key(field.name.to_string()));
            match map.get(field.name) {
                Some(value) => {
                    if let Some(v) = self.check(value, &field.kind) {
                        shaped.insert(field.name.to_string(), v);
                    }
                }
                None if field.required => self.issue("Required"),
                None => {}
            }
            self.pop();
        }
        (self.issue_count() == before).then_some(shaped)
    }

    fn expect_str<'v>(&mut self, value: &'v Value) -> Option<&'v str> {
        match value {
            Value::String(s) => Some(s),
            other => {
                self.type_mismatch("string", other);
                None
            }
        }
    }

    fn type_mismatch(&mut self, expected: &str, received: &Value) {
        self.issue(format!(
            "Expected {expected}, received {}",
            json_type_name(received)
        ));
    }
}

/// Accepts surrounding whitespace and a single leading `v`
fn parse_semver(s: &str) -> Option<semver::Version> {
    let s = s.trim();
    semver::Version::parse(s.strip_prefix('v').unwrap_or(s)).ok()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
