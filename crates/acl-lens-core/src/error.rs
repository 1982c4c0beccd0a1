use crate::model::ScanErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scan root does not exist or is not a folder: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("{0}")]
    Other(String),
}

/// Failure reported by a directory-membership source.
///
/// Resolver chains treat both variants as "try the next source".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory source unavailable")]
    Unavailable,

    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

/// Failure of a folder lister or ACL source for one folder. Becomes a
/// `ScanError` record; it never aborts the walk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceError {
    pub kind: ScanErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: ScanErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ScanErrorKind::from_io(&err),
            message: err.to_string(),
        }
    }
}
