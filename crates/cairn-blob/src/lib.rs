//! Blob fetch capabilities for Cairn.
//!
//! The schema layer never performs network transport or persistence itself;
//! it is handed a [`SeekFetcher`] that turns a [`BlobRef`] into a seekable
//! byte stream. This crate defines that capability and two simple
//! implementations.
//!
//! # Fetchers
//!
//! - [`InMemoryFetcher`] -- `HashMap`-based, for tests and embedding
//! - [`DiskFetcher`] -- one file per blob under a root directory
//!
//! # Rules
//!
//! 1. Blobs are immutable; a fetcher may hand out any number of independent
//!    streams over the same blob.
//! 2. A missing blob is [`FetchError::NotFound`], never an empty stream.
//! 3. Fetchers perform no retries; retry policy belongs to their callers.

pub mod disk;
pub mod error;
pub mod memory;
pub mod traits;

pub use cairn_types::BlobRef;
pub use disk::DiskFetcher;
pub use error::{FetchError, FetchResult};
pub use memory::InMemoryFetcher;
pub use traits::{ReadSeek, SeekFetcher};
