use cairn_types::BlobRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::map::SchemaMap;

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// A contiguous run of bytes contributing `size` bytes to a file or to a
/// nested `bytes` blob.
///
/// At most one of `blob_ref` (raw content) and `bytes_ref` (another schema
/// blob whose own parts are concatenated) may be set. `offset` skips that
/// many bytes of the referenced content before this part begins. A part with
/// neither reference is a hole and reads as zeros.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BytesPart {
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_ref: Option<BlobRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_ref: Option<BlobRef>,
    #[serde(skip_serializing_if = "is_zero")]
    pub offset: u64,
}

impl BytesPart {
    /// A part drawn directly from a content blob.
    pub fn blob(blob_ref: BlobRef, size: u64) -> Self {
        Self {
            size,
            blob_ref: Some(blob_ref),
            ..Default::default()
        }
    }

    /// A part drawn from a nested `bytes` (or `file`) schema blob.
    pub fn bytes(bytes_ref: BlobRef, size: u64) -> Self {
        Self {
            size,
            bytes_ref: Some(bytes_ref),
            ..Default::default()
        }
    }

    /// A run of zeros.
    pub fn hole(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Returns `true` if both references are set.
    pub fn is_conflicting(&self) -> bool {
        self.blob_ref.is_some() && self.bytes_ref.is_some()
    }

    /// End of this part's window within the referenced content.
    pub(crate) fn window_end(&self) -> SchemaResult<u64> {
        self.offset
            .checked_add(self.size)
            .ok_or_else(|| SchemaError::Decode(format!(
                "part window offset {} + size {} overflows",
                self.offset, self.size
            )))
    }
}

/// Check every part and return the total size.
///
/// Fails with `ConflictingReference` on the first part setting both
/// references.
pub fn validate_parts(parts: &[BytesPart]) -> SchemaResult<u64> {
    let mut total: u64 = 0;
    for (index, part) in parts.iter().enumerate() {
        if part.is_conflicting() {
            return Err(SchemaError::ConflictingReference { index });
        }
        total = total
            .checked_add(part.size)
            .ok_or_else(|| SchemaError::Decode("sum of part sizes overflows".into()))?;
    }
    Ok(total)
}

/// Serialize `parts` into the wire `parts` array.
///
/// Each element carries `size`, the one reference that is set, and `offset`
/// only when non-zero. Everything is validated before any output is built:
/// no part may set both references, and the sizes must sum to
/// `declared_size`.
pub fn compose_parts(declared_size: u64, parts: &[BytesPart]) -> SchemaResult<Value> {
    let total = validate_parts(parts)?;
    if total != declared_size {
        return Err(SchemaError::SizeMismatch {
            declared: declared_size,
            actual: total,
        });
    }
    Ok(serde_json::to_value(parts)?)
}

/// Set `parts` on `map`. All-or-nothing: on failure `map` is untouched.
pub fn populate_parts(map: &mut SchemaMap, declared_size: u64, parts: &[BytesPart]) -> SchemaResult<()> {
    let value = compose_parts(declared_size, parts)?;
    map.insert("parts", value);
    Ok(())
}
