use thiserror::Error;

/// Result type for data layer operations.
pub type DataResult<T> = Result<T, DataError>;

/// Errors surfaced by the data layer.
#[derive(Debug, Error)]
pub enum DataError {
    /// The cache could not be reached or an operation on it failed.
    /// A missing key is not an error and never maps here.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The authoritative store rejected or failed an operation. Duplicate
    /// nicknames surface here through the unique constraint.
    #[error("storage error: {0}")]
    Storage(String),

    /// A cache entry existed but could not be decoded.
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}
