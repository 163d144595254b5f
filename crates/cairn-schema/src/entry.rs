use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use cairn_blob::SeekFetcher;
use cairn_types::BlobRef;
use tracing::debug;

use crate::config::ReaderConfig;
use crate::dir::DirReader;
use crate::error::{SchemaError, SchemaResult};
use crate::file::FileReader;
use crate::superset::Superset;

/// A file reader shared between the entry that opened it and its callers.
pub type SharedFile = Arc<Mutex<FileReader>>;

/// A directory reader shared between the entry that opened it and its callers.
pub type SharedDir = Arc<Mutex<DirReader>>;

/// Symlink target resolution is not provided, so no value of this type can
/// exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symlink {}

/// A `file`, `directory` or `symlink` schema blob, viewed as one member of a
/// directory.
///
/// The entry holds its own copy of the decoded blob. Readers are built on
/// first access and cached, and so is a failure to build one: asking again
/// returns the same error without refetching.
pub struct DirectoryEntry {
    ss: Superset,
    blob_ref: BlobRef,
    fetcher: Arc<dyn SeekFetcher>,
    config: ReaderConfig,
    file: OnceLock<SchemaResult<SharedFile>>,
    dir: OnceLock<SchemaResult<SharedDir>>,
}

impl DirectoryEntry {
    pub fn from_superset(ss: &Superset, fetcher: Arc<dyn SeekFetcher>) -> SchemaResult<Self> {
        Self::from_superset_with_config(ss, fetcher, ReaderConfig::default())
    }

    /// Wrap a decoded blob. Fails with `MissingBlobRef` if it doesn't
    /// record where it came from and with `InvalidType` unless it is a file,
    /// directory or symlink.
    pub fn from_superset_with_config(
        ss: &Superset,
        fetcher: Arc<dyn SeekFetcher>,
        config: ReaderConfig,
    ) -> SchemaResult<Self> {
        config.validate()?;
        let blob_ref = ss.blob_ref.clone().ok_or(SchemaError::MissingBlobRef)?;
        match ss.camli_type() {
            "file" | "directory" | "symlink" => {}
            other => return Err(SchemaError::InvalidType(other.to_string())),
        }
        Ok(Self {
            ss: ss.clone(),
            blob_ref,
            fetcher,
            config,
            file: OnceLock::new(),
            dir: OnceLock::new(),
        })
    }

    pub fn from_blob_ref(fetcher: Arc<dyn SeekFetcher>, blob_ref: &BlobRef) -> SchemaResult<Self> {
        Self::from_blob_ref_with_config(fetcher, blob_ref, ReaderConfig::default())
    }

    /// Fetch and decode `blob_ref`, then wrap it.
    pub fn from_blob_ref_with_config(
        fetcher: Arc<dyn SeekFetcher>,
        blob_ref: &BlobRef,
        config: ReaderConfig,
    ) -> SchemaResult<Self> {
        let ss = Superset::from_blob_ref(fetcher.as_ref(), blob_ref)?;
        Self::from_superset_with_config(&ss, fetcher, config)
    }

    pub fn camli_type(&self) -> &str {
        self.ss.camli_type()
    }

    /// Lossy UTF-8 rendering of the entry's name.
    pub fn file_name(&self) -> String {
        self.ss.file_name()
    }

    pub fn blob_ref(&self) -> &BlobRef {
        &self.blob_ref
    }

    /// The decoded blob behind this entry.
    pub fn superset(&self) -> &Superset {
        &self.ss
    }

    /// The entry's file reader, built on first call.
    pub fn file(&self) -> SchemaResult<SharedFile> {
        self.expect_type("file")?;
        self.file
            .get_or_init(|| {
                debug!(entry = %self.blob_ref, "opening file reader for entry");
                FileReader::from_superset(Arc::clone(&self.fetcher), &self.ss, self.config)
                    .map(|fr| Arc::new(Mutex::new(fr)))
            })
            .clone()
    }

    /// The entry's directory reader, built on first call.
    pub fn directory(&self) -> SchemaResult<SharedDir> {
        self.expect_type("directory")?;
        self.dir
            .get_or_init(|| {
                debug!(entry = %self.blob_ref, "opening directory reader for entry");
                DirReader::from_superset(Arc::clone(&self.fetcher), &self.ss, self.config)
                    .map(|dr| Arc::new(Mutex::new(dr)))
            })
            .clone()
    }

    /// Always fails with `Unimplemented`.
    pub fn symlink(&self) -> SchemaResult<Symlink> {
        Err(SchemaError::Unimplemented("symlink target resolution"))
    }

    fn expect_type(&self, expected: &'static str) -> SchemaResult<()> {
        let actual = self.camli_type();
        if actual != expected {
            return Err(SchemaError::TypeMismatch {
                expected,
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("blob_ref", &self.blob_ref)
            .field("camli_type", &self.camli_type())
            .field("file_name", &self.file_name())
            .field("file_opened", &self.file.get().is_some())
            .field("dir_opened", &self.dir.get().is_some())
            .finish()
    }
}
