use cairn_types::BlobRef;
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult};

/// Key carrying the schema version. Always serialized first.
pub const VERSION_KEY: &str = "camliVersion";
/// Key carrying the schema type. Always serialized second.
pub const TYPE_KEY: &str = "camliType";

/// Generic string-keyed schema object under construction.
///
/// Builders produce `SchemaMap`s; [`SchemaMap::to_camli_json`] turns one into
/// the exact bytes of a schema blob. Keys other than `camliVersion` and
/// `camliType` are written in the map's stable key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaMap(Map<String, Value>);

impl SchemaMap {
    /// A map holding only `camliVersion` and, when non-empty, `camliType`.
    pub fn new(version: u64, camli_type: &str) -> Self {
        let mut m = Map::new();
        m.insert(VERSION_KEY.to_string(), Value::from(version));
        if !camli_type.is_empty() {
            m.insert(TYPE_KEY.to_string(), Value::from(camli_type));
        }
        Self(m)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets `camliType`.
    pub fn set_camli_type(&mut self, camli_type: &str) {
        self.insert(TYPE_KEY, camli_type);
    }

    /// The `camliType` value, if present and a string.
    pub fn camli_type(&self) -> Option<&str> {
        self.0.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// Convenience accessor for string-valued keys.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Serialize as a schema blob. See [`encode`].
    pub fn to_camli_json(&self) -> SchemaResult<String> {
        encode(self)
    }

    /// Serialize and compute the SHA-256 reference of the resulting blob.
    pub fn to_blob(&self) -> SchemaResult<(BlobRef, String)> {
        let json = self.to_camli_json()?;
        Ok((BlobRef::sha256(json.as_bytes()), json))
    }
}

impl From<Map<String, Value>> for SchemaMap {
    fn from(m: Map<String, Value>) -> Self {
        Self(m)
    }
}

/// Serialize a schema map into schema-blob bytes.
///
/// The object's first key is exactly `camliVersion` and its second
/// `camliType` (when present), since a later signing step digests a
/// byte-exact prefix of the object. The map itself is never modified, so a
/// `MissingVersion` failure leaves it as it was.
pub fn encode(map: &SchemaMap) -> SchemaResult<String> {
    let version = map.0.get(VERSION_KEY).ok_or(SchemaError::MissingVersion)?;
    let mut out = format!("{{\"{VERSION_KEY}\": {}", serde_json::to_string(version)?);

    let type_entry = map.0.get_key_value(TYPE_KEY);
    let rest = map
        .0
        .iter()
        .filter(|(k, _)| k.as_str() != VERSION_KEY && k.as_str() != TYPE_KEY);
    for (key, value) in type_entry.into_iter().chain(rest) {
        out.push_str(",\n  ");
        out.push_str(&serde_json::to_string(key)?);
        out.push_str(": ");
        // Raw newlines never occur inside JSON strings, so this only
        // re-indents nested structure.
        out.push_str(&serde_json::to_string_pretty(value)?.replace('\n', "\n  "));
    }
    out.push_str("\n}");
    Ok(out)
}
