use thiserror::Error;

/// Errors surfaced by the library engine.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Address is not a hexadecimal string.
    #[error("invalid hexadecimal address: {0:?}")]
    InvalidAddress(String),
    /// Search strategy name is not recognized.
    #[error("unknown search strategy: {0}")]
    UnknownStrategy(String),
    /// Assembly method name is not recognized.
    #[error("unknown assembly method: {0}")]
    UnknownAssemblyMethod(String),
    /// Export format name is not recognized.
    #[error("unknown export format: {0}")]
    UnknownExportFormat(String),
    /// A book was requested from zero pages.
    #[error("cannot create empty book")]
    EmptyBook,
    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for library operations.
pub type LibraryResult<T> = Result<T, LibraryError>;
