// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch root does not exist: {0:?}")]
    RootNotFound(PathBuf),

    #[error("Watch root is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("Watcher is already running")]
    AlreadyWatching,

    #[error("Native event source error: {0}")]
    Native(String),

    #[error("Scan aborted")]
    Aborted,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DirwatchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DirwatchError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<notify::Error> for DirwatchError {
    fn from(err: notify::Error) -> Self {
        DirwatchError::Native(err.to_string())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DirwatchError>;
