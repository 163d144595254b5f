use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use cairn_types::BlobRef;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::traits::{ReadSeek, SeekFetcher};

/// In-memory, HashMap-based blob fetcher.
///
/// Intended for tests and embedding. Blob bytes are shared behind `Arc`, so
/// handing out a stream never copies the blob. Every `fetch` call is counted,
/// which lets callers observe how lazily a reader pulls blobs.
pub struct InMemoryFetcher {
    blobs: RwLock<HashMap<BlobRef, Arc<[u8]>>>,
    fetches: AtomicU64,
}

impl InMemoryFetcher {
    /// Create a new empty fetcher.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Store `data` under its SHA-256 reference and return that reference.
    ///
    /// Idempotent: adding the same bytes twice stores them once.
    pub fn add_blob(&self, data: impl AsRef<[u8]>) -> BlobRef {
        let data = data.as_ref();
        let blob_ref = BlobRef::sha256(data);
        self.insert(blob_ref.clone(), data);
        blob_ref
    }

    /// Store `data` under an arbitrary reference.
    ///
    /// The reference is not checked against the content, which makes it
    /// possible to build corrupt or self-referential blob graphs in tests.
    pub fn insert(&self, blob_ref: BlobRef, data: impl AsRef<[u8]>) {
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(blob_ref, Arc::from(data.as_ref()));
    }

    /// Remove a blob. Returns `true` if it was present.
    pub fn remove(&self, blob_ref: &BlobRef) -> bool {
        let mut map = self.blobs.write().expect("lock poisoned");
        map.remove(blob_ref).is_some()
    }

    /// Returns `true` if the blob is present.
    pub fn contains(&self, blob_ref: &BlobRef) -> bool {
        self.blobs.read().expect("lock poisoned").contains_key(blob_ref)
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Number of `fetch` calls served so far, including misses.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SeekFetcher for InMemoryFetcher {
    fn fetch(&self, blob_ref: &BlobRef) -> FetchResult<(Box<dyn ReadSeek>, u64)> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let data = {
            let map = self.blobs.read().expect("lock poisoned");
            map.get(blob_ref).cloned()
        };
        match data {
            Some(data) => {
                let size = data.len() as u64;
                debug!(blob = %blob_ref, size, "memory fetch");
                Ok((Box::new(Cursor::new(data)), size))
            }
            None => Err(FetchError::NotFound(blob_ref.clone())),
        }
    }
}

impl std::fmt::Debug for InMemoryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFetcher")
            .field("blob_count", &self.len())
            .field("fetch_count", &self.fetch_count())
            .finish()
    }
}
