//! Error types for workbook operations

/// Errors from workbook operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing table is missing (e.g. no user has authorized yet).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The channel holds no postable entries after trimming and filtering.
    #[error("empty content pool: {0}")]
    EmptyContentPool(String),

    #[error("workbook parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for workbook operations.
pub type Result<T> = std::result::Result<T, Error>;
