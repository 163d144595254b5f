use cairn_types::BlobRef;

/// Errors from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The requested blob is not available from this fetcher.
    #[error("blob not found: {0}")]
    NotFound(BlobRef),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
