use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Digest algorithms a [`BlobRef`] can be computed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgo {
    /// SHA-256, the default for new blobs.
    Sha256,
    /// BLAKE3 with its default 32-byte output.
    Blake3,
}

impl HashAlgo {
    /// The algorithm prefix used in the canonical `algo-digest` form.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Look up an algorithm by its prefix.
    pub fn from_name(name: &str) -> Result<Self, TypeError> {
        match name {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedAlgo(other.to_string())),
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content-addressed identifier of a blob.
///
/// A `BlobRef` names a blob by the algorithm that hashed it and the
/// lowercase hex digest of its bytes. Equality is by value, and the canonical
/// string form is `algo-digest` (e.g. `sha256-9f86d0...`). References with an
/// algorithm this crate cannot compute are still valid values; they simply
/// cannot be produced locally.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobRef {
    algo: String,
    digest: String,
}

impl BlobRef {
    /// Hash `data` with `algo` and return its reference.
    pub fn compute(algo: HashAlgo, data: &[u8]) -> Self {
        let digest = match algo {
            HashAlgo::Sha256 => hex::encode(Sha256::digest(data)),
            HashAlgo::Blake3 => hex::encode(blake3::hash(data).as_bytes()),
        };
        Self {
            algo: algo.name().to_string(),
            digest,
        }
    }

    /// SHA-256 reference of `data`.
    pub fn sha256(data: &[u8]) -> Self {
        Self::compute(HashAlgo::Sha256, data)
    }

    /// Build a reference from an algorithm and a raw digest.
    pub fn from_digest(algo: HashAlgo, digest: &[u8]) -> Self {
        Self {
            algo: algo.name().to_string(),
            digest: hex::encode(digest),
        }
    }

    /// Parse the canonical `algo-digest` form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidBlobRef(s.to_string());
        let (algo, digest) = s.split_once('-').ok_or_else(invalid)?;
        let algo_ok = !algo.is_empty()
            && algo
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        let digest_ok = !digest.is_empty()
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !algo_ok || !digest_ok {
            return Err(invalid());
        }
        Ok(Self {
            algo: algo.to_string(),
            digest: digest.to_string(),
        })
    }

    /// The algorithm prefix.
    pub fn algo(&self) -> &str {
        &self.algo
    }

    /// The hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The algorithm, if it is one this crate can compute.
    pub fn hash_algo(&self) -> Option<HashAlgo> {
        HashAlgo::from_name(&self.algo).ok()
    }

    /// Short form: algorithm plus the first 8 digest characters.
    pub fn short(&self) -> String {
        let end = self.digest.len().min(8);
        format!("{}-{}", self.algo, &self.digest[..end])
    }

    /// Returns `true` if `data` hashes to this reference.
    pub fn matches(&self, data: &[u8]) -> bool {
        match self.hash_algo() {
            Some(algo) => Self::compute(algo, data) == *self,
            None => false,
        }
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.short())
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algo, self.digest)
    }
}

impl FromStr for BlobRef {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobRef {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlobRef> for String {
    fn from(r: BlobRef) -> Self {
        r.to_string()
    }
}
