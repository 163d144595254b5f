use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cairn_types::BlobRef;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::traits::{ReadSeek, SeekFetcher};

/// Fetcher over a directory holding one `<algo>-<digest>.dat` file per blob.
#[derive(Debug, Clone)]
pub struct DiskFetcher {
    root: PathBuf,
}

impl DiskFetcher {
    /// Open a fetcher rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> FetchResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `blob_ref`.
    pub fn blob_path(&self, blob_ref: &BlobRef) -> PathBuf {
        self.root.join(format!("{blob_ref}.dat"))
    }

    /// Write `data` under its SHA-256 reference.
    ///
    /// Each write goes to its own temporary file that is then persisted into
    /// place, so concurrent writers of the same blob never see a partial
    /// file. Losing the final rename to another writer of the same content
    /// is success.
    pub fn put(&self, data: &[u8]) -> FetchResult<BlobRef> {
        let blob_ref = BlobRef::sha256(data);
        let path = self.blob_path(&blob_ref);
        if path.exists() {
            return Ok(blob_ref);
        }
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        if let Err(e) = tmp.persist(&path) {
            if !path.exists() {
                return Err(e.error.into());
            }
            debug!(blob = %blob_ref, "blob written concurrently by another writer");
            return Ok(blob_ref);
        }
        debug!(blob = %blob_ref, size = data.len(), "blob written");
        Ok(blob_ref)
    }
}

impl SeekFetcher for DiskFetcher {
    fn fetch(&self, blob_ref: &BlobRef) -> FetchResult<(Box<dyn ReadSeek>, u64)> {
        let path = self.blob_path(blob_ref);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(blob_ref.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();
        Ok((Box::new(file), size))
    }
}
