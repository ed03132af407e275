use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type used by shared (cloneable) operation handles.
///
/// Shared futures hand the same output to every waiter, so the error
/// side has to be cloneable; `std::io::Error` is not, hence the `Arc`.
pub type SharedResult<T> = std::result::Result<T, Arc<CatalogError>>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog path: {0}")]
    InvalidPath(String),

    #[error("Indexing was interrupted")]
    Interrupted,

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Content fetch failed: {0}")]
    Fetch(String),

    #[error("Background task failed: {0}")]
    Task(String),
}
