use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cairn_blob::{ReadSeek, SeekFetcher};
use cairn_types::BlobRef;
use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::parts::{validate_parts, BytesPart};
use crate::superset::{SchemaBody, Superset};

/// Zero-fill granularity for holes; the closed flag is checked per chunk.
const HOLE_CHUNK: usize = 64 * 1024;

/// Handle that closes a [`FileReader`] from anywhere, without holding the
/// reader itself.
#[derive(Clone, Debug)]
pub struct Closer(Arc<AtomicBool>);

impl Closer {
    /// Mark the reader closed. A read in progress fails with `Closed` before
    /// it pulls its next chunk from the content stream; later reads and
    /// skips fail immediately.
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parts of a nested `bytes` (or `file`) blob, decoded once per reader.
struct NestedParts {
    parts: Vec<BytesPart>,
    size: u64,
}

/// The content blob currently open, kept so sequential reads within one
/// part don't refetch it.
struct OpenBlob {
    blob_ref: BlobRef,
    stream: Box<dyn ReadSeek>,
    size: u64,
    pos: u64,
}

/// Reads a `file` schema blob as one contiguous byte stream.
///
/// Content blobs are fetched only when the cursor reaches them, and only one
/// is held open at a time. Parts that go through `bytesRef` are resolved
/// recursively, each applying its own `offset`/`size` window over the
/// concatenation of the nested blob's parts. Nesting deeper than
/// [`ReaderConfig::max_bytes_depth`] and part graphs that loop back on
/// themselves are rejected. Declared sizes are not trusted: a content blob
/// shorter than its part claims fails with `SizeMismatch`.
pub struct FileReader {
    fetcher: Arc<dyn SeekFetcher>,
    blob_ref: BlobRef,
    parts: Arc<[BytesPart]>,
    size: u64,
    pos: u64,
    config: ReaderConfig,
    nested: HashMap<BlobRef, Arc<NestedParts>>,
    open: Option<OpenBlob>,
    closed: Arc<AtomicBool>,
}

impl FileReader {
    /// Fetch and decode `blob_ref`, then build a reader over it.
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

    /// Build a reader over an already decoded `file` (or `bytes`) blob.
    pub fn from_superset(
        fetcher: Arc<dyn SeekFetcher>,
        ss: &Superset,
        config: ReaderConfig,
    ) -> SchemaResult<Self> {
        config.validate()?;
        let blob_ref = ss.blob_ref.clone().ok_or(SchemaError::MissingBlobRef)?;
        let parts = match &ss.body {
            SchemaBody::File(f) => f.parts.clone(),
            SchemaBody::Bytes(b) => b.parts.clone(),
            other => {
                return Err(SchemaError::TypeMismatch {
                    expected: "file",
                    actual: other.camli_type().to_string(),
                })
            }
        };
        let size = validate_parts(&parts)?;
        debug!(file = %blob_ref, size, parts = parts.len(), "opened file reader");
        Ok(Self {
            fetcher,
            blob_ref,
            parts: parts.into(),
            size,
            pos: 0,
            config,
            nested: HashMap::new(),
            open: None,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn blob_ref(&self) -> &BlobRef {
        &self.blob_ref
    }

    /// Total content size, the sum of the top-level part sizes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// A handle that can close this reader from another thread.
    pub fn closer(&self) -> Closer {
        Closer(Arc::clone(&self.closed))
    }

    /// Fill `buf` from the cursor onward, crossing part boundaries as
    /// needed. Returns the number of bytes read; `0` means end of content.
    pub fn read(&mut self, buf: &mut [u8]) -> SchemaResult<usize> {
        self.read_inner(buf)
    }

    /// Advance the cursor by up to `n` bytes without fetching anything.
    /// Returns the distance actually moved, short at end of content.
    pub fn skip(&mut self, n: u64) -> SchemaResult<u64> {
        self.check_open()?;
        let skipped = n.min(self.size.saturating_sub(self.pos));
        self.pos += skipped;
        Ok(skipped)
    }

    /// Release the open blob handle. Later reads and skips fail with
    /// `Closed`. Closing twice is harmless.
    pub fn close(&mut self) -> SchemaResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        self.open = None;
        self.nested.clear();
    }

    fn check_open(&mut self) -> SchemaResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            self.release();
            return Err(SchemaError::Closed);
        }
        Ok(())
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> SchemaResult<usize> {
        self.check_open()?;
        let mut filled = 0;
        while filled < buf.len() && self.pos < self.size {
            self.check_open()?;
            let parts = Arc::clone(&self.parts);
            let mut path = vec![self.blob_ref.clone()];
            let n = self.read_parts(&parts, self.pos, &mut buf[filled..], &mut path)?;
            if n == 0 {
                break;
            }
            filled += n;
            self.pos += n as u64;
        }
        Ok(filled)
    }

    /// Read from the concatenation of `parts`, starting `offset` bytes in,
    /// stopping at the end of whichever leaf part holds `offset`.
    ///
    /// `path` holds the blobs currently being descended through.
    fn read_parts(
        &mut self,
        parts: &[BytesPart],
        offset: u64,
        buf: &mut [u8],
        path: &mut Vec<BlobRef>,
    ) -> SchemaResult<usize> {
        let mut base: u64 = 0;
        for (index, part) in parts.iter().enumerate() {
            let end = base.saturating_add(part.size);
            if offset >= end {
                base = end;
                continue;
            }
            let within = offset - base;
            let want = usize::try_from(part.size - within)
                .unwrap_or(usize::MAX)
                .min(buf.len());
            let buf = &mut buf[..want];
            let window_end = part.window_end()?;
            return match (&part.blob_ref, &part.bytes_ref) {
                (Some(_), Some(_)) => Err(SchemaError::ConflictingReference { index }),
                (Some(blob_ref), None) => {
                    self.read_blob(blob_ref, part.offset + within, window_end, buf)
                }
                (None, Some(bytes_ref)) => {
                    self.read_nested(bytes_ref, part.offset + within, window_end, buf, path)
                }
                (None, None) => self.read_hole(buf),
            };
        }
        Ok(0)
    }

    fn read_hole(&mut self, buf: &mut [u8]) -> SchemaResult<usize> {
        for chunk in buf.chunks_mut(HOLE_CHUNK) {
            self.check_open()?;
            chunk.fill(0);
        }
        Ok(buf.len())
    }

    fn read_blob(
        &mut self,
        blob_ref: &BlobRef,
        start: u64,
        window_end: u64,
        buf: &mut [u8],
    ) -> SchemaResult<usize> {
        let closed = Arc::clone(&self.closed);
        let open = self.open_blob(blob_ref)?;
        if open.size < window_end {
            warn!(blob = %blob_ref, declared = window_end, actual = open.size, "content blob shorter than its part");
            return Err(SchemaError::SizeMismatch {
                declared: window_end,
                actual: open.size,
            });
        }
        if open.pos != start {
            open.stream.seek(SeekFrom::Start(start))?;
            open.pos = start;
        }
        let mut read = 0;
        while read < buf.len() {
            // A concurrent close stops the read between stream chunks.
            if closed.load(Ordering::SeqCst) {
                self.release();
                return Err(SchemaError::Closed);
            }
            let n = open.stream.read(&mut buf[read..])?;
            if n == 0 {
                let actual = open.pos;
                self.open = None;
                return Err(SchemaError::SizeMismatch {
                    declared: window_end,
                    actual,
                });
            }
            read += n;
            open.pos += n as u64;
        }
        Ok(read)
    }

    fn open_blob(&mut self, blob_ref: &BlobRef) -> SchemaResult<&mut OpenBlob> {
        let open = match self.open.take() {
            Some(open) if open.blob_ref == *blob_ref => open,
            _ => {
                let (stream, size) = self.fetcher.fetch(blob_ref)?;
                debug!(blob = %blob_ref, size, "fetched content blob");
                OpenBlob {
                    blob_ref: blob_ref.clone(),
                    stream,
                    size,
                    pos: 0,
                }
            }
        };
        Ok(self.open.insert(open))
    }

    fn read_nested(
        &mut self,
        bytes_ref: &BlobRef,
        start: u64,
        window_end: u64,
        buf: &mut [u8],
        path: &mut Vec<BlobRef>,
    ) -> SchemaResult<usize> {
        if path.contains(bytes_ref) {
            warn!(blob = %bytes_ref, file = %self.blob_ref, "part graph refers back to itself");
            return Err(SchemaError::Cycle(bytes_ref.clone()));
        }
        if path.len() > self.config.max_bytes_depth {
            warn!(blob = %bytes_ref, max = self.config.max_bytes_depth, "bytesRef nesting too deep");
            return Err(SchemaError::RecursionLimit {
                max: self.config.max_bytes_depth,
            });
        }
        let nested = self.nested_parts(bytes_ref)?;
        if nested.size < window_end {
            warn!(blob = %bytes_ref, declared = window_end, actual = nested.size, "nested bytes shorter than its part");
            return Err(SchemaError::SizeMismatch {
                declared: window_end,
                actual: nested.size,
            });
        }
        path.push(bytes_ref.clone());
        let result = self.read_parts(&nested.parts, start, buf, path);
        path.pop();
        result
    }

    fn nested_parts(&mut self, bytes_ref: &BlobRef) -> SchemaResult<Arc<NestedParts>> {
        if let Some(nested) = self.nested.get(bytes_ref) {
            return Ok(Arc::clone(nested));
        }
        let ss = Superset::from_blob_ref(self.fetcher.as_ref(), bytes_ref)?;
        let parts = match ss.body {
            SchemaBody::Bytes(b) => b.parts,
            SchemaBody::File(f) => f.parts,
            other => {
                return Err(SchemaError::TypeMismatch {
                    expected: "bytes",
                    actual: other.camli_type().to_string(),
                })
            }
        };
        let size = validate_parts(&parts)?;
        let nested = Arc::new(NestedParts { parts, size });
        self.nested.insert(bytes_ref.clone(), Arc::clone(&nested));
        Ok(nested)
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(io::Error::from)
    }
}

impl Seek for FileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_open().map_err(io::Error::from)?;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.size.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative or overflowing position")
        })?;
        self.pos = target;
        Ok(target)
    }
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("blob_ref", &self.blob_ref)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{new_bytes, new_camli_map};
    use crate::filemap::new_file_map;
    use crate::parts::populate_parts;
    use cairn_blob::InMemoryFetcher;

    fn store_file(fetcher: &InMemoryFetcher, parts: &[BytesPart]) -> BlobRef {
        let size = parts.iter().map(|p| p.size).sum();
        let mut m = new_file_map("f");
        populate_parts(&mut m, size, parts).unwrap();
        fetcher.add_blob(m.to_camli_json().unwrap())
    }

    fn store_bytes(fetcher: &InMemoryFetcher, parts: &[BytesPart]) -> BlobRef {
        let size = parts.iter().map(|p| p.size).sum();
        let mut m = new_bytes();
        populate_parts(&mut m, size, parts).unwrap();
        fetcher.add_blob(m.to_camli_json().unwrap())
    }

    fn open(fetcher: &Arc<InMemoryFetcher>, r: &BlobRef) -> FileReader {
        FileReader::new(fetcher.clone(), r).unwrap()
    }

    fn read_all(fr: &mut FileReader) -> Vec<u8> {
        let mut out = Vec::new();
        Read::read_to_end(fr, &mut out).unwrap();
        out
    }

    fn abc_defg(fetcher: &InMemoryFetcher) -> BlobRef {
        let a = fetcher.add_blob(b"abc");
        let b = fetcher.add_blob(b"defg");
        store_file(fetcher, &[BytesPart::blob(a, 3), BytesPart::blob(b, 4)])
    }

    #[test]
    fn reads_parts_as_one_stream() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        assert_eq!(fr.size(), 7);
        assert_eq!(read_all(&mut fr), b"abcdefg");
    }

    #[test]
    fn skip_then_read() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        assert_eq!(fr.skip(4).unwrap(), 4);
        assert_eq!(read_all(&mut fr), b"efg");
    }

    #[test]
    fn skip_is_short_at_end() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        assert_eq!(fr.skip(5).unwrap(), 5);
        assert_eq!(fr.skip(100).unwrap(), 2);
        assert_eq!(fr.skip(1).unwrap(), 0);
        let mut buf = [0u8; 4];
        assert_eq!(fr.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn skip_fetches_nothing() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        let after_open = fetcher.fetch_count();
        fr.skip(3).unwrap();
        assert_eq!(fetcher.fetch_count(), after_open);
        let mut buf = [0u8; 4];
        assert_eq!(fr.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"defg");
        // Only the second content blob was needed.
        assert_eq!(fetcher.fetch_count(), after_open + 1);
    }

    #[test]
    fn small_reads_reuse_open_blob() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let big = fetcher.add_blob(vec![7u8; 1000]);
        let file = store_file(&fetcher, &[BytesPart::blob(big, 1000)]);
        let mut fr = open(&fetcher, &file);
        let after_open = fetcher.fetch_count();
        let mut buf = [0u8; 10];
        for _ in 0..50 {
            assert_eq!(fr.read(&mut buf).unwrap(), 10);
        }
        assert_eq!(fetcher.fetch_count(), after_open + 1);
        assert_eq!(fr.position(), 500);
    }

    #[test]
    fn offsets_select_subranges() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let alphabet = fetcher.add_blob(b"abcdefghijklmnopqrstuvwxyz");
        let file = store_file(
            &fetcher,
            &[
                BytesPart::blob(alphabet.clone(), 3).with_offset(7),
                BytesPart::blob(alphabet, 2).with_offset(24),
            ],
        );
        assert_eq!(read_all(&mut open(&fetcher, &file)), b"hijyz");
    }

    #[test]
    fn nested_bytes_window() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let a = fetcher.add_blob(b"01234");
        let b = fetcher.add_blob(b"56789");
        let bytes = store_bytes(&fetcher, &[BytesPart::blob(a, 5), BytesPart::blob(b, 5)]);
        // Window [3, 8) over "0123456789", then a plain blob.
        let tail = fetcher.add_blob(b"!");
        let file = store_file(
            &fetcher,
            &[BytesPart::bytes(bytes, 5).with_offset(3), BytesPart::blob(tail, 1)],
        );
        let mut fr = open(&fetcher, &file);
        assert_eq!(read_all(&mut fr), b"34567!");

        let mut fr = open(&fetcher, &file);
        fr.skip(2).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(fr.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"56");
    }

    #[test]
    fn nested_file_reuse() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let inner = abc_defg(&fetcher);
        let file = store_file(&fetcher, &[BytesPart::bytes(inner, 4).with_offset(2)]);
        assert_eq!(read_all(&mut open(&fetcher, &file)), b"cdef");
    }

    #[test]
    fn holes_read_as_zeros() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let a = fetcher.add_blob(b"ab");
        let file = store_file(&fetcher, &[BytesPart::blob(a, 2), BytesPart::hole(3)]);
        assert_eq!(read_all(&mut open(&fetcher, &file)), b"ab\0\0\0");
    }

    #[test]
    fn short_blob_is_size_mismatch() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let a = fetcher.add_blob(b"abc");
        let file = store_file(&fetcher, &[BytesPart::blob(a, 10)]);
        let mut fr = open(&fetcher, &file);
        let mut buf = [0u8; 16];
        assert!(matches!(
            fr.read(&mut buf),
            Err(SchemaError::SizeMismatch { declared: 10, actual: 3 })
        ));
    }

    #[test]
    fn missing_content_blob_is_not_found() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let gone = BlobRef::sha256(b"never stored");
        let file = store_file(&fetcher, &[BytesPart::blob(gone.clone(), 4)]);
        let mut fr = open(&fetcher, &file);
        let mut buf = [0u8; 4];
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::NotFound(r)) if r == gone));
    }

    #[test]
    fn conflicting_part_rejected_on_open() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let a = BlobRef::sha256(b"a");
        let r = fetcher.add_blob(format!(
            r#"{{"camliVersion": 1, "camliType": "file", "parts": [{{"size": 1, "blobRef": "{a}", "bytesRef": "{a}"}}]}}"#
        ));
        assert!(matches!(
            FileReader::new(fetcher, &r),
            Err(SchemaError::ConflictingReference { index: 0 })
        ));
    }

    #[test]
    fn self_reference_is_cycle() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let looped = BlobRef::sha256(b"looped bytes");
        let mut m = new_bytes();
        populate_parts(&mut m, 4, &[BytesPart::bytes(looped.clone(), 4)]).unwrap();
        fetcher.insert(looped.clone(), m.to_camli_json().unwrap());
        let file = store_file(&fetcher, &[BytesPart::bytes(looped.clone(), 4)]);

        let mut fr = open(&fetcher, &file);
        let mut buf = [0u8; 4];
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::Cycle(r)) if r == looped));
    }

    #[test]
    fn depth_limit_enforced() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let mut inner = {
            let leaf = fetcher.add_blob(b"x");
            store_bytes(&fetcher, &[BytesPart::blob(leaf, 1)])
        };
        for _ in 0..4 {
            inner = store_bytes(&fetcher, &[BytesPart::bytes(inner, 1)]);
        }
        let file = store_file(&fetcher, &[BytesPart::bytes(inner, 1)]);

        let config = ReaderConfig::default().with_max_bytes_depth(3);
        let mut fr = FileReader::new_with_config(fetcher.clone(), &file, config).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::RecursionLimit { max: 3 })));

        let config = ReaderConfig::default().with_max_bytes_depth(5);
        let mut fr = FileReader::new_with_config(fetcher.clone(), &file, config).unwrap();
        assert_eq!(read_all(&mut fr), b"x");
    }

    #[test]
    fn nested_window_past_end_rejected() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let a = fetcher.add_blob(b"abc");
        let bytes = store_bytes(&fetcher, &[BytesPart::blob(a, 3)]);
        let file = store_file(&fetcher, &[BytesPart::bytes(bytes, 3).with_offset(1)]);
        let mut buf = [0u8; 3];
        assert!(matches!(
            open(&fetcher, &file).read(&mut buf),
            Err(SchemaError::SizeMismatch { declared: 4, actual: 3 })
        ));
    }

    #[test]
    fn nested_wrong_type_rejected() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let set = fetcher.add_blob(new_camli_map("static-set").to_camli_json().unwrap());
        let file = store_file(&fetcher, &[BytesPart::bytes(set, 1)]);
        let mut buf = [0u8; 1];
        assert!(matches!(
            open(&fetcher, &file).read(&mut buf),
            Err(SchemaError::TypeMismatch { expected: "bytes", .. })
        ));
    }

    #[test]
    fn close_then_read_fails() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        let mut buf = [0u8; 2];
        fr.read(&mut buf).unwrap();
        fr.close().unwrap();
        fr.close().unwrap();
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::Closed)));
        assert!(matches!(fr.skip(1), Err(SchemaError::Closed)));
    }

    #[test]
    fn closer_works_across_threads() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        let closer = fr.closer();
        std::thread::spawn(move || closer.close())
            .join()
            .expect("thread should not panic");
        let mut buf = [0u8; 2];
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::Closed)));
        assert!(fr.closer().is_closed());
    }

    /// Hands out `target` as a stream that closes the reader on its first
    /// read and then trickles one byte per call.
    struct ClosingFetcher {
        inner: InMemoryFetcher,
        target: BlobRef,
        closer: std::sync::OnceLock<Closer>,
    }

    struct ClosingStream {
        inner: io::Cursor<Vec<u8>>,
        closer: Option<Closer>,
    }

    impl Read for ClosingStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(closer) = self.closer.take() {
                closer.close();
            }
            let n = buf.len().min(1);
            self.inner.read(&mut buf[..n])
        }
    }

    impl Seek for ClosingStream {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl SeekFetcher for ClosingFetcher {
        fn fetch(&self, blob_ref: &BlobRef) -> cairn_blob::FetchResult<(Box<dyn ReadSeek>, u64)> {
            if *blob_ref != self.target {
                return self.inner.fetch(blob_ref);
            }
            let data = self.inner.fetch_bytes(blob_ref)?;
            let size = data.len() as u64;
            let stream = ClosingStream {
                inner: io::Cursor::new(data),
                closer: self.closer.get().cloned(),
            };
            Ok((Box::new(stream), size))
        }
    }

    #[test]
    fn close_stops_read_within_a_part() {
        let inner = InMemoryFetcher::new();
        let target = inner.add_blob(vec![9u8; 1000]);
        let file = store_file(&inner, &[BytesPart::blob(target.clone(), 1000)]);
        let fetcher = Arc::new(ClosingFetcher {
            inner,
            target,
            closer: std::sync::OnceLock::new(),
        });
        let mut fr = FileReader::new(fetcher.clone(), &file).unwrap();
        fetcher.closer.set(fr.closer()).unwrap();

        let mut buf = [0u8; 1000];
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::Closed)));
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::Closed)));
        assert!(fr.open.is_none());
    }

    #[test]
    fn closed_reader_reads_no_hole() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = store_file(&fetcher, &[BytesPart::hole(3 * HOLE_CHUNK as u64)]);
        let mut fr = open(&fetcher, &file);
        let mut buf = vec![1u8; 3 * HOLE_CHUNK];
        assert_eq!(fr.read(&mut buf[..10]).unwrap(), 10);
        fr.closer().close();
        assert!(matches!(fr.read(&mut buf), Err(SchemaError::Closed)));
        assert_eq!(fr.position(), 10);
    }

    #[test]
    fn seek_and_io_read() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = abc_defg(&fetcher);
        let mut fr = open(&fetcher, &file);
        assert_eq!(fr.seek(SeekFrom::End(-2)).unwrap(), 5);
        assert_eq!(read_all(&mut fr), b"fg");
        assert_eq!(fr.seek(SeekFrom::Current(-4)).unwrap(), 3);
        let mut s = String::new();
        Read::read_to_string(&mut fr, &mut s).unwrap();
        assert_eq!(s, "defg");
        assert!(fr.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn wrong_type_rejected() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let r = fetcher.add_blob(new_camli_map("permanode").to_camli_json().unwrap());
        assert!(matches!(
            FileReader::new(fetcher, &r),
            Err(SchemaError::TypeMismatch { expected: "file", .. })
        ));
    }

    #[test]
    fn empty_file() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let file = store_file(&fetcher, &[]);
        let mut fr = open(&fetcher, &file);
        assert_eq!(fr.size(), 0);
        assert!(read_all(&mut fr).is_empty());
    }
}
