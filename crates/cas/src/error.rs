//! Error types for the content store.

use std::path::PathBuf;

use thiserror::Error;

use crate::hash::HashError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, CasError>;

/// Errors surfaced by the content store.
///
/// Routine absence (missing key, missing file to hash) is never an error;
/// those paths return `Option` or `bool`.
#[derive(Debug, Error)]
pub enum CasError {
    /// The root does not hold all 256 shard directories and creation was not requested.
    #[error("not a valid content store: {}", path.display())]
    StoreNotValid { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] HashError),
}

impl CasError {
    /// The underlying I/O error, if this is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            CasError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}
