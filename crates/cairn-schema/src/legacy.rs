//! Legacy byte-array encoding of file names and symlink targets.
//!
//! Names that aren't valid UTF-8 are written as `fileNameBytes` /
//! `symlinkTargetBytes`: a JSON array whose elements are either
//! one-character strings or numeric byte values.

use serde::{Deserialize, Serialize};

/// One element of a legacy byte array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyByte {
    /// A single character, contributing its UTF-8 bytes.
    Text(String),
    /// A single raw byte.
    Raw(u8),
}

/// A validated legacy byte array.
///
/// Every element is checked when decoding: strings must hold exactly one
/// character and numbers must fit in a byte, otherwise the whole array is
/// rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LegacyByte>", into = "Vec<LegacyByte>")]
pub struct LegacyBytes(Vec<LegacyByte>);

impl LegacyBytes {
    /// Encode raw bytes, one numeric element per byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.iter().copied().map(LegacyByte::Raw).collect())
    }

    /// Reassemble the byte sequence.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len());
        for element in &self.0 {
            match element {
                LegacyByte::Text(s) => out.extend_from_slice(s.as_bytes()),
                LegacyByte::Raw(b) => out.push(*b),
            }
        }
        out
    }

    pub fn elements(&self) -> &[LegacyByte] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<LegacyByte>> for LegacyBytes {
    type Error = String;

    fn try_from(elements: Vec<LegacyByte>) -> Result<Self, Self::Error> {
        for (i, element) in elements.iter().enumerate() {
            if let LegacyByte::Text(s) = element {
                if s.chars().count() != 1 {
                    return Err(format!("byte array element {i} ({s:?}) is not a single character"));
                }
            }
        }
        Ok(Self(elements))
    }
}

impl From<LegacyBytes> for Vec<LegacyByte> {
    fn from(b: LegacyBytes) -> Self {
        b.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_array_reassembles() {
        let b: LegacyBytes = serde_json::from_str(r#"["H", "i", 255, "é"]"#).unwrap();
        assert_eq!(b.to_bytes(), [b'H', b'i', 0xff, 0xc3, 0xa9]);
    }

    #[test]
    fn from_bytes_roundtrip() {
        let raw = [b'a', 0xfe, b'z'];
        let b = LegacyBytes::from_bytes(&raw);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[97,254,122]");
        let back: LegacyBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_bytes(), raw);
    }

    #[test]
    fn multi_char_string_rejected() {
        assert!(serde_json::from_str::<LegacyBytes>(r#"["Hi"]"#).is_err());
        assert!(serde_json::from_str::<LegacyBytes>(r#"[""]"#).is_err());
    }

    #[test]
    fn out_of_range_numbers_rejected() {
        assert!(serde_json::from_str::<LegacyBytes>("[256]").is_err());
        assert!(serde_json::from_str::<LegacyBytes>("[-1]").is_err());
        assert!(serde_json::from_str::<LegacyBytes>("[1.5]").is_err());
    }

    #[test]
    fn other_element_kinds_rejected() {
        assert!(serde_json::from_str::<LegacyBytes>("[true]").is_err());
        assert!(serde_json::from_str::<LegacyBytes>("[null]").is_err());
        assert!(serde_json::from_str::<LegacyBytes>(r#"[["a"]]"#).is_err());
    }
}
