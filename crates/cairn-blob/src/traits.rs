use std::io::{Read, Seek};
use std::sync::Arc;

use cairn_types::BlobRef;

use crate::error::FetchResult;

/// A readable, seekable byte stream over one blob.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Capability to open blobs by reference.
///
/// Implementations must satisfy these invariants:
/// - The returned stream yields exactly the blob's bytes, starting at
///   offset 0, and the returned length is the blob's total size.
/// - Missing blobs fail with `FetchError::NotFound`.
/// - Calls may block on disk or network I/O; cancellation, if needed, is
///   the implementation's concern.
pub trait SeekFetcher: Send + Sync {
    /// Open `blob_ref` and return a stream over it plus its total length.
    fn fetch(&self, blob_ref: &BlobRef) -> FetchResult<(Box<dyn ReadSeek>, u64)>;

    /// Fetch a blob fully into memory.
    ///
    /// Intended for small schema blobs; file content should be streamed.
    fn fetch_bytes(&self, blob_ref: &BlobRef) -> FetchResult<Vec<u8>> {
        let (mut stream, size) = self.fetch(blob_ref)?;
        let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<F: SeekFetcher + ?Sized> SeekFetcher for Arc<F> {
    fn fetch(&self, blob_ref: &BlobRef) -> FetchResult<(Box<dyn ReadSeek>, u64)> {
        (**self).fetch(blob_ref)
    }
}
