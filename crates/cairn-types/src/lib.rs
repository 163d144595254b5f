//! Foundation types for Cairn.
//!
//! Cairn is a content-addressable storage substrate: every unit of data and
//! metadata is a blob named by a cryptographic hash of its bytes. This crate
//! holds the small value types every other Cairn crate depends on.
//!
//! # Key Types
//!
//! - [`BlobRef`] -- `algo-digest` identifier of a blob
//! - [`HashAlgo`] -- supported digest algorithms
//! - [`BlobHasher`] -- streaming hasher producing a [`BlobRef`]
//! - [`time`] -- the canonical RFC3339 timestamp form used in schema blobs

pub mod blobref;
pub mod error;
pub mod hasher;
pub mod time;

pub use blobref::{BlobRef, HashAlgo};
pub use error::TypeError;
pub use hasher::BlobHasher;
