//! Schema maps describing local filesystem entries.

use std::ffi::OsStr;
use std::fs::{File, Metadata};
use std::io;
use std::path::Path;

use cairn_types::{time, BlobHasher, BlobRef, HashAlgo};
use chrono::{DateTime, Utc};

use crate::builder::new_camli_map;
use crate::map::SchemaMap;

#[cfg(unix)]
pub(crate) fn os_bytes(s: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().to_vec()
}

#[cfg(not(unix))]
pub(crate) fn os_bytes(s: &OsStr) -> Vec<u8> {
    s.to_string_lossy().into_owned().into_bytes()
}

/// A versioned map carrying only the base name of `file_name`.
///
/// Names that aren't valid UTF-8 are written as `fileNameBytes`. A path with
/// no final component (such as `/`) gets no name at all.
pub fn new_common_filename_map(file_name: impl AsRef<Path>) -> SchemaMap {
    let mut m = new_camli_map("");
    if let Some(base) = file_name.as_ref().file_name() {
        let bytes = os_bytes(base);
        match std::str::from_utf8(&bytes) {
            Ok(s) => {
                m.insert("fileName", s);
            }
            Err(_) => {
                let elements: Vec<serde_json::Value> = bytes.iter().map(|b| (*b).into()).collect();
                m.insert("fileNameBytes", elements);
            }
        }
    }
    m
}

/// A `file` map named after `file_name`; add parts with
/// [`populate_parts`](crate::populate_parts).
pub fn new_file_map(file_name: impl AsRef<Path>) -> SchemaMap {
    let mut m = new_common_filename_map(file_name);
    m.set_camli_type("file");
    m
}

/// Platform-specific metadata hook applied when building file maps.
pub trait StatPopulator: Send + Sync {
    fn populate(&self, map: &mut SchemaMap, metadata: &Metadata);
}

/// Records numeric owner and group ids.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixOwnerPopulator;

#[cfg(unix)]
impl StatPopulator for UnixOwnerPopulator {
    fn populate(&self, map: &mut SchemaMap, metadata: &Metadata) {
        use std::os::unix::fs::MetadataExt;
        map.insert("unixOwnerId", metadata.uid());
        map.insert("unixGroupId", metadata.gid());
    }
}

/// Builds file maps from local metadata using the populators it was given.
///
/// The hosting program decides which platform hooks apply and injects them
/// here; there is no global registry.
#[derive(Default)]
pub struct FileMapBuilder {
    populators: Vec<Box<dyn StatPopulator>>,
}

impl FileMapBuilder {
    /// A builder with no platform hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder with the hooks appropriate for the current platform.
    pub fn for_host() -> Self {
        let builder = Self::new();
        #[cfg(unix)]
        let builder = builder.with_populator(UnixOwnerPopulator);
        builder
    }

    pub fn with_populator(mut self, populator: impl StatPopulator + 'static) -> Self {
        self.populators.push(Box::new(populator));
        self
    }

    /// Name, permission, populator output and modification time for the
    /// entry at `path`. `unixPermission` is omitted for symlinks.
    pub fn new_common_file_map(&self, path: &Path, metadata: &Metadata) -> SchemaMap {
        let mut m = new_common_filename_map(path);
        if !metadata.file_type().is_symlink() {
            m.insert("unixPermission", format!("0{:o}", permission_bits(metadata)));
        }
        for populator in &self.populators {
            populator.populate(&mut m, metadata);
        }
        if let Ok(mtime) = metadata.modified() {
            m.insert("unixMtime", time::rfc3339_from_time(DateTime::<Utc>::from(mtime)));
        }
        m
    }

    /// [`new_common_file_map`](Self::new_common_file_map) typed as `file`.
    pub fn new_file_map(&self, path: &Path, metadata: &Metadata) -> SchemaMap {
        let mut m = self.new_common_file_map(path, metadata);
        m.set_camli_type("file");
        m
    }
}

impl std::fmt::Debug for FileMapBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMapBuilder")
            .field("populators", &self.populators.len())
            .finish()
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Stats and hashes local files for higher layers building file maps.
pub trait StatHasher: Send + Sync {
    fn lstat(&self, path: &Path) -> io::Result<Metadata>;
    fn hash(&self, path: &Path) -> io::Result<BlobRef>;
}

/// `lstat` plus a full-content digest of the file.
#[derive(Debug, Clone, Copy)]
pub struct DefaultStatHasher {
    algo: HashAlgo,
}

impl DefaultStatHasher {
    pub fn new(algo: HashAlgo) -> Self {
        Self { algo }
    }
}

impl Default for DefaultStatHasher {
    fn default() -> Self {
        Self::new(HashAlgo::Sha256)
    }
}

impl StatHasher for DefaultStatHasher {
    fn lstat(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::symlink_metadata(path)
    }

    fn hash(&self, path: &Path) -> io::Result<BlobRef> {
        let mut file = File::open(path)?;
        let mut hasher = BlobHasher::new(self.algo);
        io::copy(&mut file, &mut hasher)?;
        Ok(hasher.finish())
    }
}
