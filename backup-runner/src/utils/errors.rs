//! Custom error types for the backup engine.

use crate::fs::scanner::ItemKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Path is neither a file nor a directory: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Unsupported hash algorithm: {0} (expected md5, sha1 or sha256)")]
    UnsupportedAlgorithm(String),

    #[error("Transfer of {kind} {} failed: {source}", .path.display())]
    Transfer {
        kind: ItemKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt manifest {}: {source}", .path.display())]
    CorruptManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Wrap an I/O failure raised while transferring a single item.
    pub fn transfer(kind: ItemKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Transfer {
            kind,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
