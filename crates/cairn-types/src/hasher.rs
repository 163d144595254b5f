use std::io;

use sha2::{Digest, Sha256};

use crate::blobref::{BlobRef, HashAlgo};

/// Streaming content hasher that yields a [`BlobRef`].
///
/// Implements [`io::Write`] so file contents can be hashed with
/// `io::copy` without buffering the whole file.
pub struct BlobHasher {
    state: HasherState,
}

enum HasherState {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl BlobHasher {
    /// Create a hasher for the given algorithm.
    pub fn new(algo: HashAlgo) -> Self {
        let state = match algo {
            HashAlgo::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgo::Blake3 => HasherState::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self { state }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(h) => h.update(data),
            HasherState::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Finish hashing and return the reference.
    pub fn finish(self) -> BlobRef {
        match self.state {
            HasherState::Sha256(h) => BlobRef::from_digest(HashAlgo::Sha256, &h.finalize()),
            HasherState::Blake3(h) => BlobRef::from_digest(HashAlgo::Blake3, h.finalize().as_bytes()),
        }
    }
}

impl Default for BlobHasher {
    fn default() -> Self {
        Self::new(HashAlgo::Sha256)
    }
}

impl io::Write for BlobHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
