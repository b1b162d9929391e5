//! Error types for the configuration store
//!
//! [`StoreError`] is the umbrella returned by every [`crate::ConfigStore`]
//! operation. Lock and write failures convert into it with `?`; tree errors
//! are wrapped with the operation and key that triggered them.

use crate::durable::WriteError;
use crate::lock::LockError;
use dotyaml_core::{CodecError, PathError};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Store operation, for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read a key
    Get,
    /// Write a key
    Set,
    /// Remove a key
    Delete,
    /// Append to a sequence
    Push,
    /// Remove the last sequence element
    Pop,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Push => "push",
            Self::Pop => "pop",
        })
    }
}

/// Errors from store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File contents could not be decoded or encoded
    #[error("invalid YAML in {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Key path did not fit the document shape
    #[error("{operation} failed for '{key}': {source}")]
    Path {
        operation: Operation,
        key: String,
        #[source]
        source: PathError,
    },

    /// Advisory lock failure
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Filesystem error outside the durable writer
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf, create_hint: bool },

    /// Key does not exist
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// One entry of a batch failed; nothing was written
    #[error("batch entry {index} ('{key}') failed: {source}")]
    Batch {
        index: usize,
        key: String,
        #[source]
        source: Box<StoreError>,
    },

    /// Durable write failed; the target is unchanged
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Template file could not be read
    #[error("failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required keys are absent
    #[error("missing required keys: {}", keys.join(", "))]
    MissingKeys { keys: Vec<String> },

    /// Required-keys file rejected
    #[error("invalid required keys file {path}: {reason}")]
    RequiredKeysFile { path: PathBuf, reason: String },
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create codec error for path
    pub fn codec(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Codec {
            path: path.into(),
            source,
        }
    }

    /// Wrap a tree error with its operation and key
    pub fn path(operation: Operation, key: impl Into<String>, source: PathError) -> Self {
        Self::Path {
            operation,
            key: key.into(),
            source,
        }
    }

    /// Check if this is a missing key (as opposed to a stored null)
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the config file itself is missing
    #[inline]
    #[must_use]
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }

    /// Suggestion to show next to the error, if any
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::FileNotFound {
                create_hint: true, ..
            } => Some("use the create option to create the file"),
            _ => None,
        }
    }
}

/// Store result alias
pub type StoreResult<T> = Result<T, StoreError>;
