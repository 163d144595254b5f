use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid blob reference: {0:?}")]
    InvalidBlobRef(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgo(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
}
