//! Error types for the progression core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressionError {
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Ledger dispatch error: {0}")]
    Ledger(String),
}

pub type Result<T> = std::result::Result<T, ProgressionError>;
