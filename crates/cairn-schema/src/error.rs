use std::io;
use std::sync::Arc;

use cairn_blob::FetchError;
use cairn_types::BlobRef;

/// Errors from schema operations.
///
/// `Clone` so that a failed lazy resolution can be cached and handed out
/// again on every later access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// Malformed JSON, or a field whose JSON type doesn't match its shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The schema map or blob lacks `camliVersion`.
    #[error("schema: no camliVersion key in map")]
    MissingVersion,

    /// The blob's type can't be used as a directory entry.
    #[error("invalid directory entry camliType {0:?}")]
    InvalidType(String),

    /// A superset was handed over without the reference it was decoded from.
    #[error("superset has no blob reference")]
    MissingBlobRef,

    /// A referenced blob is not available from the fetcher.
    #[error("blob not found: {0}")]
    NotFound(BlobRef),

    /// The blob is a different schema type than the operation needs.
    #[error("blob is camliType {actual:?}, not {expected:?}")]
    TypeMismatch { expected: &'static str, actual: String },

    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),

    /// A part sets both `blobRef` and `bytesRef`.
    #[error("part {index} contains both blobRef and bytesRef")]
    ConflictingReference { index: usize },

    /// Declared and actual sizes disagree.
    #[error("size mismatch: declared {declared}, actual {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    /// The reader was closed.
    #[error("reader is closed")]
    Closed,

    /// Nested `bytesRef` indirection exceeds the configured depth.
    #[error("bytesRef nesting exceeds maximum depth {max}")]
    RecursionLimit { max: usize },

    /// A part graph refers back to a blob already being read.
    #[error("cycle in part graph at {0}")]
    Cycle(BlobRef),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<io::Error> for SchemaError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<FetchError> for SchemaError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound(r) => Self::NotFound(r),
            FetchError::Io(e) => Self::Io(Arc::new(e)),
        }
    }
}

impl From<SchemaError> for io::Error {
    fn from(e: SchemaError) -> Self {
        let kind = match &e {
            SchemaError::Io(inner) => inner.kind(),
            SchemaError::NotFound(_) => io::ErrorKind::NotFound,
            SchemaError::Closed => io::ErrorKind::BrokenPipe,
            SchemaError::SizeMismatch { .. } => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, e)
    }
}
