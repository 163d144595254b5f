use std::sync::Arc;

use cairn_blob::SeekFetcher;
use cairn_types::BlobRef;
use tracing::debug;

use crate::config::ReaderConfig;
use crate::entry::DirectoryEntry;
use crate::error::{SchemaError, SchemaResult};
use crate::superset::{SchemaBody, Superset};

/// Outcome of one [`DirReader::readdir`] call.
#[derive(Debug)]
pub enum Readdir {
    Entries(Vec<DirectoryEntry>),
    /// A bounded read found nothing left.
    End,
}

impl Readdir {
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// The entries read, empty for [`Readdir::End`].
    pub fn into_entries(self) -> Vec<DirectoryEntry> {
        match self {
            Self::Entries(entries) => entries,
            Self::End => Vec::new(),
        }
    }
}

/// Lists the members of a `directory` schema blob.
///
/// The `static-set` behind `entries` is fetched on the first
/// [`readdir`](Self::readdir), not at construction. Each call resolves the
/// member blobs it returns into [`DirectoryEntry`] values; their own readers
/// open only when asked for.
pub struct DirReader {
    fetcher: Arc<dyn SeekFetcher>,
    ss: Superset,
    blob_ref: BlobRef,
    entries: BlobRef,
    config: ReaderConfig,
    members: Option<Arc<[BlobRef]>>,
    cursor: usize,
}

impl DirReader {
    pub fn new(fetcher: Arc<dyn SeekFetcher>, blob_ref: &BlobRef) -> SchemaResult<Self> {
        Self::new_with_config(fetcher, blob_ref, ReaderConfig::default())
    }

    pub fn new_with_config(
        fetcher: Arc<dyn SeekFetcher>,
        blob_ref: &BlobRef,
        config: ReaderConfig,
    ) -> SchemaResult<Self> {
        let ss = Superset::from_blob_ref(fetcher.as_ref(), blob_ref)?;
        Self::from_superset(fetcher, &ss, config)
    }

    pub fn from_superset(
        fetcher: Arc<dyn SeekFetcher>,
        ss: &Superset,
        config: ReaderConfig,
    ) -> SchemaResult<Self> {
        config.validate()?;
        let blob_ref = ss.blob_ref.clone().ok_or(SchemaError::MissingBlobRef)?;
        let entries = match &ss.body {
            SchemaBody::Directory(d) => d.entries.clone().ok_or_else(|| {
                SchemaError::Decode(format!("directory {blob_ref} has no entries reference"))
            })?,
            other => {
                return Err(SchemaError::TypeMismatch {
                    expected: "directory",
                    actual: other.camli_type().to_string(),
                })
            }
        };
        Ok(Self {
            fetcher,
            ss: ss.clone(),
            blob_ref,
            entries,
            config,
            members: None,
            cursor: 0,
        })
    }

    pub fn blob_ref(&self) -> &BlobRef {
        &self.blob_ref
    }

    pub fn file_name(&self) -> String {
        self.ss.file_name()
    }

    /// Reference to the `static-set` listing the members.
    pub fn entries_ref(&self) -> &BlobRef {
        &self.entries
    }

    /// Read up to `count` entries from the cursor, or all remaining ones
    /// when `count` is 0.
    ///
    /// An unbounded read always returns [`Readdir::Entries`], possibly
    /// empty. A bounded read with nothing left returns [`Readdir::End`].
    /// Every entry in the batch is resolved before the cursor moves, so a
    /// failure leaves the cursor where it was.
    pub fn readdir(&mut self, count: usize) -> SchemaResult<Readdir> {
        let members = self.members()?;
        let start = self.cursor.min(members.len());
        let end = if count == 0 {
            members.len()
        } else {
            start.saturating_add(count).min(members.len())
        };
        if count > 0 && start == end {
            debug!(dir = %self.blob_ref, "readdir reached end");
            return Ok(Readdir::End);
        }

        let entries = members[start..end]
            .iter()
            .map(|member| {
                DirectoryEntry::from_blob_ref_with_config(Arc::clone(&self.fetcher), member, self.config)
            })
            .collect::<SchemaResult<Vec<_>>>()?;
        self.cursor = end;
        debug!(dir = %self.blob_ref, returned = entries.len(), remaining = members.len() - end, "readdir");
        Ok(Readdir::Entries(entries))
    }

    /// Members not yet returned.
    pub fn remaining(&mut self) -> SchemaResult<usize> {
        let total = self.members()?.len();
        Ok(total.saturating_sub(self.cursor))
    }

    /// Start listing from the first member again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn members(&mut self) -> SchemaResult<Arc<[BlobRef]>> {
        if let Some(members) = &self.members {
            return Ok(Arc::clone(members));
        }
        let set = Superset::from_blob_ref(self.fetcher.as_ref(), &self.entries)?;
        let members = match set.body {
            SchemaBody::StaticSet(s) => s.members,
            other => {
                return Err(SchemaError::TypeMismatch {
                    expected: "static-set",
                    actual: other.camli_type().to_string(),
                })
            }
        };
        debug!(dir = %self.blob_ref, members = members.len(), "loaded directory members");
        let members: Arc<[BlobRef]> = members.into();
        self.members = Some(Arc::clone(&members));
        Ok(members)
    }
}

impl std::fmt::Debug for DirReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirReader")
            .field("blob_ref", &self.blob_ref)
            .field("entries", &self.entries)
            .field("loaded", &self.members.as_ref().map(|m| m.len()))
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{new_camli_map, populate_directory_map};
    use crate::filemap::{new_common_filename_map, new_file_map};
    use crate::static_set::StaticSet;
    use cairn_blob::InMemoryFetcher;

    fn store_dir(fetcher: &InMemoryFetcher, name: &str, members: &[BlobRef]) -> BlobRef {
        let set: StaticSet = members.iter().cloned().collect();
        let set_ref = fetcher.add_blob(set.map().to_camli_json().unwrap());
        let mut m = new_common_filename_map(name);
        populate_directory_map(&mut m, &set_ref);
        fetcher.add_blob(m.to_camli_json().unwrap())
    }

    fn five_files(fetcher: &InMemoryFetcher) -> Vec<BlobRef> {
        (0..5)
            .map(|i| fetcher.add_blob(new_file_map(format!("f{i}")).to_camli_json().unwrap()))
            .collect()
    }

    fn names(entries: &[DirectoryEntry]) -> Vec<String> {
        entries.iter().map(DirectoryEntry::file_name).collect()
    }

    #[test]
    fn readdir_all() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let files = five_files(&fetcher);
        let dir = store_dir(&fetcher, "d", &files);
        let mut dr = DirReader::new(fetcher, &dir).unwrap();
        let entries = dr.readdir(0).unwrap().into_entries();
        assert_eq!(names(&entries), ["f0", "f1", "f2", "f3", "f4"]);
        // Unbounded reads never signal end.
        assert!(matches!(dr.readdir(0).unwrap(), Readdir::Entries(e) if e.is_empty()));
    }

    #[test]
    fn readdir_in_batches() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let files = five_files(&fetcher);
        let dir = store_dir(&fetcher, "d", &files);
        let mut dr = DirReader::new(fetcher, &dir).unwrap();

        let mut sizes = Vec::new();
        loop {
            match dr.readdir(2).unwrap() {
                Readdir::Entries(e) => sizes.push(e.len()),
                Readdir::End => break,
            }
        }
        assert_eq!(sizes, [2, 2, 1]);
        assert!(dr.readdir(2).unwrap().is_end());
        assert_eq!(dr.remaining().unwrap(), 0);

        dr.rewind();
        assert_eq!(dr.remaining().unwrap(), 5);
        assert_eq!(names(&dr.readdir(1).unwrap().into_entries()), ["f0"]);
    }

    #[test]
    fn empty_directory() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let dir = store_dir(&fetcher, "empty", &[]);
        let mut dr = DirReader::new(fetcher, &dir).unwrap();
        assert!(matches!(dr.readdir(0).unwrap(), Readdir::Entries(e) if e.is_empty()));
        assert!(dr.readdir(3).unwrap().is_end());
    }

    #[test]
    fn members_load_lazily() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let files = five_files(&fetcher);
        let dir = store_dir(&fetcher, "photos", &files);
        let mut dr = DirReader::new(fetcher.clone(), &dir).unwrap();
        assert_eq!(dr.file_name(), "photos");
        assert_eq!(fetcher.fetch_count(), 1);

        dr.readdir(2).unwrap();
        // The static set plus two member blobs.
        assert_eq!(fetcher.fetch_count(), 4);
        dr.readdir(2).unwrap();
        assert_eq!(fetcher.fetch_count(), 6);
    }

    #[test]
    fn failed_batch_keeps_cursor() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let mut files = five_files(&fetcher);
        let missing = BlobRef::sha256(b"not stored yet");
        files.insert(1, missing.clone());
        let dir = store_dir(&fetcher, "d", &files);
        let mut dr = DirReader::new(fetcher.clone(), &dir).unwrap();

        assert!(matches!(dr.readdir(3), Err(SchemaError::NotFound(r)) if r == missing));
        assert_eq!(dr.remaining().unwrap(), 6);

        fetcher.insert(missing, new_file_map("late").to_camli_json().unwrap());
        assert_eq!(names(&dr.readdir(3).unwrap().into_entries()), ["f0", "late", "f1"]);
    }

    #[test]
    fn entries_must_be_static_set() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let bogus = fetcher.add_blob(new_camli_map("bytes").to_camli_json().unwrap());
        let mut m = new_common_filename_map("d");
        populate_directory_map(&mut m, &bogus);
        let dir = fetcher.add_blob(m.to_camli_json().unwrap());
        let mut dr = DirReader::new(fetcher, &dir).unwrap();
        assert!(matches!(
            dr.readdir(0),
            Err(SchemaError::TypeMismatch { expected: "static-set", .. })
        ));
    }

    #[test]
    fn rejects_non_directory() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = fetcher.add_blob(new_file_map("f").to_camli_json().unwrap());
        assert!(matches!(
            DirReader::new(fetcher, &file),
            Err(SchemaError::TypeMismatch { expected: "directory", .. })
        ));
    }

    #[test]
    fn directory_without_entries_rejected() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let r = fetcher.add_blob(new_camli_map("directory").to_camli_json().unwrap());
        assert!(matches!(DirReader::new(fetcher, &r), Err(SchemaError::Decode(_))));
    }

    #[test]
    fn nested_directories() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let inner = store_dir(&fetcher, "inner", &five_files(&fetcher));
        let outer = store_dir(&fetcher, "outer", &[inner]);
        let mut dr = DirReader::new(fetcher, &outer).unwrap();
        let entries = dr.readdir(0).unwrap().into_entries();
        assert_eq!(entries[0].camli_type(), "directory");
        let sub = entries[0].directory().unwrap();
        let mut sub = sub.lock().unwrap();
        assert_eq!(sub.file_name(), "inner");
        assert_eq!(sub.remaining().unwrap(), 5);
    }
}
