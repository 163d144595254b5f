use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::Engine;
use cairn_types::{time, BlobRef};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::error;

use crate::error::{SchemaError, SchemaResult};
use crate::filemap::os_bytes;
use crate::legacy::LegacyBytes;
use crate::map::SchemaMap;

/// Schema version written by every builder.
pub const SCHEMA_VERSION: u64 = 1;

/// Share auth type granting access to anyone holding the share's reference.
pub const SHARE_HAVE_REF: &str = "haveref";

const PERMANODE_RANDOM_LEN: usize = 20;

/// A fresh map with the current schema version and `camli_type`.
pub fn new_camli_map(camli_type: &str) -> SchemaMap {
    SchemaMap::new(SCHEMA_VERSION, camli_type)
}

/// An unsigned `permanode` with 20 bytes of OS randomness.
///
/// # Panics
///
/// Panics if the OS random source fails. A permanode built from anything
/// predictable would break the uniqueness every claim against it relies on,
/// so there is no fallback.
pub fn new_unsigned_permanode() -> SchemaMap {
    let mut random = [0u8; PERMANODE_RANDOM_LEN];
    if let Err(e) = OsRng.try_fill_bytes(&mut random) {
        error!(error = %e, "OS random source failed while minting a permanode");
        panic!("error reading random bytes: {e}");
    }
    let mut m = new_camli_map("permanode");
    m.insert("random", base64::engine::general_purpose::STANDARD.encode(random));
    m
}

/// Kind of attribute change a claim asserts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClaimType {
    SetAttribute,
    AddAttribute,
    DelAttribute,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetAttribute => "set-attribute",
            Self::AddAttribute => "add-attribute",
            Self::DelAttribute => "del-attribute",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set-attribute" => Ok(Self::SetAttribute),
            "add-attribute" => Ok(Self::AddAttribute),
            "del-attribute" => Ok(Self::DelAttribute),
            other => Err(SchemaError::Decode(format!("unknown claimType {other:?}"))),
        }
    }
}

/// A claim against `permanode`, dated now.
pub fn new_claim(permanode: &BlobRef, claim_type: ClaimType) -> SchemaMap {
    new_claim_at(permanode, claim_type, Utc::now())
}

/// A claim against `permanode` with an explicit `claimDate`.
pub fn new_claim_at(permanode: &BlobRef, claim_type: ClaimType, date: DateTime<Utc>) -> SchemaMap {
    let mut m = new_camli_map("claim");
    m.insert("permaNode", permanode.to_string());
    m.insert("claimType", claim_type.as_str());
    m.insert("claimDate", time::rfc3339_from_time(date));
    m
}

/// An attribute-change claim. A `del-attribute` claim never carries a
/// `value` key, whatever `value` holds: the key's absence is what tells a
/// deletion apart from setting the empty string.
pub fn new_attr_change_claim(
    permanode: &BlobRef,
    claim_type: ClaimType,
    attribute: &str,
    value: &str,
) -> SchemaMap {
    let mut m = new_claim(permanode, claim_type);
    m.insert("attribute", attribute);
    if claim_type != ClaimType::DelAttribute {
        m.insert("value", value);
    }
    m
}

pub fn new_set_attribute_claim(permanode: &BlobRef, attribute: &str, value: &str) -> SchemaMap {
    new_attr_change_claim(permanode, ClaimType::SetAttribute, attribute, value)
}

pub fn new_add_attribute_claim(permanode: &BlobRef, attribute: &str, value: &str) -> SchemaMap {
    new_attr_change_claim(permanode, ClaimType::AddAttribute, attribute, value)
}

pub fn new_del_attribute_claim(permanode: &BlobRef, attribute: &str) -> SchemaMap {
    new_attr_change_claim(permanode, ClaimType::DelAttribute, attribute, "")
}

/// A `share` granting access to `target`.
pub fn new_share_ref(auth_type: &str, target: &BlobRef, transitive: bool) -> SchemaMap {
    let mut m = new_camli_map("share");
    m.insert("authType", auth_type);
    m.insert("target", target.to_string());
    m.insert("transitive", transitive);
    m
}

/// An empty `bytes` map; add parts with [`populate_parts`](crate::populate_parts).
pub fn new_bytes() -> SchemaMap {
    new_camli_map("bytes")
}

/// Turn `m` into a `directory` whose members live in `static_set`.
pub fn populate_directory_map(m: &mut SchemaMap, static_set: &BlobRef) {
    m.set_camli_type("directory");
    m.insert("entries", static_set.to_string());
}

/// Turn `m` into a `symlink` pointing where the link at `path` points.
///
/// Targets that aren't valid UTF-8 are written as `symlinkTargetBytes`.
pub fn populate_symlink_map(m: &mut SchemaMap, path: &Path) -> SchemaResult<()> {
    let target = std::fs::read_link(path)?;
    m.set_camli_type("symlink");
    let bytes = os_bytes(target.as_os_str());
    match std::str::from_utf8(&bytes) {
        Ok(s) => {
            m.insert("symlinkTarget", s);
        }
        Err(_) => {
            m.insert(
                "symlinkTargetBytes",
                serde_json::to_value(LegacyBytes::from_bytes(&bytes))?,
            );
        }
    }
    Ok(())
}
