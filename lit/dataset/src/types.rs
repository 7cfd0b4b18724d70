use std::{borrow::Borrow, collections::BTreeMap, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One example: ordered field name to value mapping.
pub type Record = IndexMap<String, Value>;

/// Declarative schema: ordered field name to descriptor mapping.
pub type Spec = IndexMap<String, FieldSpec>;

/// Source field name to target field name, applied by [`remap_keys`].
pub type FieldMap = IndexMap<String, String>;

const fn default_required() -> bool {
    true
}

/// Typed descriptor for one field of a [`Spec`].
///
/// Only `required` carries meaning for the dataset core; `kind` and `attrs`
/// are compared structurally when specs are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Type name of the field (for example `TextSegment` or `CategoryLabel`).
    #[serde(rename = "__name__")]
    pub kind: String,
    /// Whether a model needs this field to run.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Type-specific attributes (vocabulary, parent field, ...).
    #[serde(flatten, default)]
    pub attrs: BTreeMap<String, Value>,
}

impl FieldSpec {
    /// Creates a required field of the given type.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            required: true,
            attrs: BTreeMap::new(),
        }
    }

    /// Marks the field as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Adds a type-specific attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

/// Stable identity of a record, produced by an identity function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExampleId(String);

impl ExampleId {
    /// Wraps an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrowed identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ExampleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExampleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ExampleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Record paired with its identity and a free-form annotation bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// Record content.
    pub data: Record,
    /// Identity computed from `data`.
    pub id: ExampleId,
    /// Annotations such as provenance; never part of the identity.
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl IndexedRecord {
    /// Creates an indexed record with empty metadata.
    #[must_use]
    pub fn new(data: Record, id: ExampleId) -> Self {
        Self {
            data,
            id,
            meta: Map::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Renames keys of `map` according to `field_map`, keeping positions.
///
/// Keys absent from `field_map` are kept as-is. When a renamed key lands on a
/// key that already exists, the later value replaces the earlier one in place.
#[must_use]
pub fn remap_keys<V: Clone>(
    map: &IndexMap<String, V>,
    field_map: &FieldMap,
) -> IndexMap<String, V> {
    let mut out = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let key = field_map.get(key).unwrap_or(key);
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Content hash of a record, usable as an identity function.
///
/// Hashes the record's JSON form with object keys sorted at every depth, so
/// field order never changes the id.
#[must_use]
pub fn content_id(record: &Record) -> ExampleId {
    let sorted: BTreeMap<&str, Value> = record
        .iter()
        .map(|(key, value)| (key.as_str(), canonical(value)))
        .collect();
    // Serializing a map of strings to JSON values cannot fail.
    let bytes = serde_json::to_vec(&sorted).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    ExampleId(format!("{digest:x}"))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Builds a [`Record`] from a JSON object; other JSON values yield `None`.
#[must_use]
pub fn record_from_json(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}
