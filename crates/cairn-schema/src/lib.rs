//! Schema blobs for Cairn.
//!
//! Schema blobs are small JSON documents stored in the blob store alongside
//! raw content. They describe how content blobs combine into files,
//! directories and symlinks, and carry the permanodes and claims that give
//! mutable identity to immutable data.
//!
//! # Architecture
//!
//! - **Codec**: [`SchemaMap`] builds blobs with a canonical key order;
//!   [`Superset`] decodes any of them into a typed [`SchemaBody`]
//! - **Composer**: [`BytesPart`] lists and [`populate_parts`]
//! - **StaticSet**: concurrent builder for directory member lists
//! - **Readers**: [`FileReader`] streams file content across nested parts,
//!   [`DirReader`] lists a directory, [`DirectoryEntry`] resolves members
//! - **Builders**: permanodes, claims, shares and file maps from local
//!   metadata
//!
//! All blob access goes through a [`SeekFetcher`](cairn_blob::SeekFetcher)
//! supplied by the caller.

pub mod builder;
pub mod config;
pub mod dir;
pub mod entry;
pub mod error;
pub mod file;
pub mod filemap;
pub mod legacy;
pub mod map;
pub mod parts;
pub mod static_set;
pub mod superset;

pub use builder::{
    new_add_attribute_claim, new_attr_change_claim, new_bytes, new_camli_map, new_claim,
    new_claim_at, new_del_attribute_claim, new_set_attribute_claim, new_share_ref,
    new_unsigned_permanode, populate_directory_map, populate_symlink_map, ClaimType,
    SCHEMA_VERSION, SHARE_HAVE_REF,
};
pub use config::ReaderConfig;
pub use dir::{DirReader, Readdir};
pub use entry::{DirectoryEntry, SharedDir, SharedFile, Symlink};
pub use error::{SchemaError, SchemaResult};
pub use file::{Closer, FileReader};
pub use filemap::{
    new_common_filename_map, new_file_map, DefaultStatHasher, FileMapBuilder, StatHasher,
    StatPopulator,
};
pub use legacy::{LegacyByte, LegacyBytes};
pub use map::{encode, SchemaMap};
pub use parts::{compose_parts, populate_parts, validate_parts, BytesPart};
pub use static_set::StaticSet;
pub use superset::{SchemaBody, Superset};
