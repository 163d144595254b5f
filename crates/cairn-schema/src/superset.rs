use cairn_blob::SeekFetcher;
use cairn_types::{time, BlobRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::legacy::LegacyBytes;
use crate::map::{SchemaMap, TYPE_KEY, VERSION_KEY};
use crate::parts::BytesPart;

const SIGNER_KEY: &str = "camliSigner";
const SIG_KEY: &str = "camliSig";

const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

/// `fileName` with its legacy `fileNameBytes` fallback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileNameFields {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name_bytes: Option<LegacyBytes>,
}

impl FileNameFields {
    /// The name's bytes. The plain string wins whenever it is non-empty.
    pub fn bytes(&self) -> Vec<u8> {
        if !self.file_name.is_empty() {
            return self.file_name.as_bytes().to_vec();
        }
        self.file_name_bytes
            .as_ref()
            .map(LegacyBytes::to_bytes)
            .unwrap_or_default()
    }
}

/// Unix metadata shared by files, directories and symlinks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnixAttrs {
    /// Octal permission string, e.g. `"0644"`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_permission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_owner_id: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_group_id: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_mtime: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_ctime: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_atime: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermanodeSchema {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub random: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSchema {
    #[serde(flatten)]
    pub name: FileNameFields,
    #[serde(flatten)]
    pub unix: UnixAttrs,
    pub parts: Vec<BytesPart>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySchema {
    #[serde(flatten)]
    pub name: FileNameFields,
    #[serde(flatten)]
    pub unix: UnixAttrs,
    /// The static-set listing this directory's members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<BlobRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SymlinkSchema {
    #[serde(flatten)]
    pub name: FileNameFields,
    #[serde(flatten)]
    pub unix: UnixAttrs,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub symlink_target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target_bytes: Option<LegacyBytes>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSetSchema {
    pub members: Vec<BlobRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BytesSchema {
    pub parts: Vec<BytesPart>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perma_node: Option<BlobRef>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub claim_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub claim_date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub attribute: String,
    /// `None` when the key is absent, which is how deletions are expressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareSchema {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<BlobRef>,
    pub transitive: bool,
}

/// Type-specific content of a schema blob, keyed by `camliType`.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaBody {
    Permanode(PermanodeSchema),
    File(FileSchema),
    Directory(DirectorySchema),
    Symlink(SymlinkSchema),
    StaticSet(StaticSetSchema),
    Bytes(BytesSchema),
    Claim(ClaimSchema),
    Share(ShareSchema),
    /// A type this crate doesn't know (or no type at all). Every field is
    /// kept so the blob can be re-encoded unchanged.
    Unrecognized {
        camli_type: String,
        fields: Map<String, Value>,
    },
}

impl SchemaBody {
    fn decode(camli_type: &str, fields: Map<String, Value>) -> SchemaResult<Self> {
        fn typed<T: serde::de::DeserializeOwned>(fields: Map<String, Value>) -> SchemaResult<T> {
            Ok(serde_json::from_value(Value::Object(fields))?)
        }
        Ok(match camli_type {
            "permanode" => Self::Permanode(typed(fields)?),
            "file" => Self::File(typed(fields)?),
            "directory" => Self::Directory(typed(fields)?),
            "symlink" => Self::Symlink(typed(fields)?),
            "static-set" => Self::StaticSet(typed(fields)?),
            "bytes" => Self::Bytes(typed(fields)?),
            "claim" => Self::Claim(typed(fields)?),
            "share" => Self::Share(typed(fields)?),
            other => Self::Unrecognized {
                camli_type: other.to_string(),
                fields,
            },
        })
    }

    /// The wire `camliType` of this body.
    pub fn camli_type(&self) -> &str {
        match self {
            Self::Permanode(_) => "permanode",
            Self::File(_) => "file",
            Self::Directory(_) => "directory",
            Self::Symlink(_) => "symlink",
            Self::StaticSet(_) => "static-set",
            Self::Bytes(_) => "bytes",
            Self::Claim(_) => "claim",
            Self::Share(_) => "share",
            Self::Unrecognized { camli_type, .. } => camli_type,
        }
    }

    fn to_fields(&self) -> SchemaResult<Map<String, Value>> {
        let value = match self {
            Self::Permanode(b) => serde_json::to_value(b)?,
            Self::File(b) => serde_json::to_value(b)?,
            Self::Directory(b) => serde_json::to_value(b)?,
            Self::Symlink(b) => serde_json::to_value(b)?,
            Self::StaticSet(b) => serde_json::to_value(b)?,
            Self::Bytes(b) => serde_json::to_value(b)?,
            Self::Claim(b) => serde_json::to_value(b)?,
            Self::Share(b) => serde_json::to_value(b)?,
            Self::Unrecognized { fields, .. } => return Ok(fields.clone()),
        };
        match value {
            Value::Object(m) => Ok(m),
            _ => Err(SchemaError::Decode("schema body did not serialize to an object".into())),
        }
    }
}

/// Decoded form of any schema blob.
///
/// The envelope (`camliVersion`, signature fields) plus a [`SchemaBody`]
/// holding only the fields meaningful for the blob's type. `blob_ref` is not
/// part of the JSON; it records which blob this was decoded from.
#[derive(Clone, Debug, PartialEq)]
pub struct Superset {
    pub blob_ref: Option<BlobRef>,
    pub version: u32,
    pub signer: Option<String>,
    pub sig: Option<String>,
    pub body: SchemaBody,
}

impl Superset {
    /// Decode schema-blob bytes.
    ///
    /// Unknown keys are ignored and missing keys take their zero values, but
    /// an object without `camliVersion` is rejected with `MissingVersion` and
    /// a recognized key holding the wrong JSON type fails with `Decode`.
    pub fn decode(bytes: &[u8]) -> SchemaResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(value: Value) -> SchemaResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(SchemaError::Decode("schema blob is not a JSON object".into()));
        };
        let version = match fields.remove(VERSION_KEY) {
            None | Some(Value::Null) => return Err(SchemaError::MissingVersion),
            Some(v) => serde_json::from_value::<u32>(v)?,
        };
        let camli_type = match fields.remove(TYPE_KEY) {
            None | Some(Value::Null) => String::new(),
            Some(v) => serde_json::from_value::<String>(v)?,
        };
        let signer = take_string(&mut fields, SIGNER_KEY)?;
        let sig = take_string(&mut fields, SIG_KEY)?;
        let body = SchemaBody::decode(&camli_type, fields)?;
        Ok(Self {
            blob_ref: None,
            version,
            signer,
            sig,
            body,
        })
    }

    /// Fetch `blob_ref` and decode it, recording the reference.
    pub fn from_blob_ref(fetcher: &dyn SeekFetcher, blob_ref: &BlobRef) -> SchemaResult<Self> {
        let bytes = fetcher.fetch_bytes(blob_ref)?;
        let mut ss = Self::decode(&bytes)?;
        debug!(blob = %blob_ref, camli_type = ss.camli_type(), "decoded schema blob");
        ss.blob_ref = Some(blob_ref.clone());
        Ok(ss)
    }

    pub fn with_blob_ref(mut self, blob_ref: BlobRef) -> Self {
        self.blob_ref = Some(blob_ref);
        self
    }

    /// Rebuild the generic map this superset was decoded from.
    ///
    /// Every recognized field survives, as does every field of an
    /// unrecognized type.
    pub fn to_map(&self) -> SchemaResult<SchemaMap> {
        let mut map = SchemaMap::new(u64::from(self.version), self.body.camli_type());
        if let Some(signer) = &self.signer {
            map.insert(SIGNER_KEY, signer.as_str());
        }
        if let Some(sig) = &self.sig {
            map.insert(SIG_KEY, sig.as_str());
        }
        for (k, v) in self.body.to_fields()? {
            map.insert(k, v);
        }
        Ok(map)
    }

    pub fn camli_type(&self) -> &str {
        self.body.camli_type()
    }

    fn name_fields(&self) -> Option<&FileNameFields> {
        match &self.body {
            SchemaBody::File(f) => Some(&f.name),
            SchemaBody::Directory(d) => Some(&d.name),
            SchemaBody::Symlink(s) => Some(&s.name),
            _ => None,
        }
    }

    /// Raw bytes of the file name; empty for types without one.
    pub fn file_name_bytes(&self) -> Vec<u8> {
        self.name_fields().map(FileNameFields::bytes).unwrap_or_default()
    }

    /// The file name, with invalid UTF-8 replaced.
    pub fn file_name(&self) -> String {
        String::from_utf8_lossy(&self.file_name_bytes()).into_owned()
    }

    pub fn has_file_name(&self, name: &str) -> bool {
        self.file_name_bytes() == name.as_bytes()
    }

    /// Raw bytes of a symlink's target; empty for other types.
    pub fn symlink_target_bytes(&self) -> Vec<u8> {
        match &self.body {
            SchemaBody::Symlink(s) if !s.symlink_target.is_empty() => {
                s.symlink_target.as_bytes().to_vec()
            }
            SchemaBody::Symlink(s) => s
                .symlink_target_bytes
                .as_ref()
                .map(LegacyBytes::to_bytes)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn symlink_target(&self) -> String {
        String::from_utf8_lossy(&self.symlink_target_bytes()).into_owned()
    }

    /// Content parts of a `file` or `bytes` blob.
    pub fn parts(&self) -> &[BytesPart] {
        match &self.body {
            SchemaBody::File(f) => &f.parts,
            SchemaBody::Bytes(b) => &b.parts,
            _ => &[],
        }
    }

    /// Sum of the declared part sizes, saturating on overflow.
    pub fn sum_parts_size(&self) -> u64 {
        self.parts()
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.size))
    }

    /// The static-set reference of a directory.
    pub fn entries(&self) -> Option<&BlobRef> {
        match &self.body {
            SchemaBody::Directory(d) => d.entries.as_ref(),
            _ => None,
        }
    }

    /// Members of a static set; empty for other types.
    pub fn members(&self) -> &[BlobRef] {
        match &self.body {
            SchemaBody::StaticSet(s) => &s.members,
            _ => &[],
        }
    }

    pub fn unix_attrs(&self) -> Option<&UnixAttrs> {
        match &self.body {
            SchemaBody::File(f) => Some(&f.unix),
            SchemaBody::Directory(d) => Some(&d.unix),
            SchemaBody::Symlink(s) => Some(&s.unix),
            _ => None,
        }
    }

    /// Unix mode: permission bits from `unixPermission` plus the file-type
    /// bits implied by `camliType`. An unparsable permission contributes
    /// nothing.
    pub fn unix_mode(&self) -> u32 {
        let perm = self
            .unix_attrs()
            .and_then(|u| u32::from_str_radix(u.unix_permission.trim(), 8).ok())
            .unwrap_or(0);
        let kind = match self.camli_type() {
            "directory" => S_IFDIR,
            "symlink" => S_IFLNK,
            "file" => S_IFREG,
            _ => 0,
        };
        perm | kind
    }

    pub fn owner_id(&self) -> Option<u32> {
        self.unix_attrs().and_then(|u| u.unix_owner_id)
    }

    pub fn group_id(&self) -> Option<u32> {
        self.unix_attrs().and_then(|u| u.unix_group_id)
    }

    /// Parsed `unixMtime`, if present and well-formed.
    pub fn mod_time(&self) -> Option<DateTime<Utc>> {
        let mtime = &self.unix_attrs()?.unix_mtime;
        if mtime.is_empty() {
            return None;
        }
        time::parse_rfc3339(mtime).ok()
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> SchemaResult<Option<String>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
    }
}
