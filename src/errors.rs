//! Error types for the scan pipeline.
//!
//! Only [`ConnectionError`] ends a run. Traversal, extraction, and publish errors are per-node or
//! per-file and are absorbed by the orchestrator into [`ScanStatistics`](crate::ScanStatistics).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::broker::{ConnectionEvent, ConnectionState, TransportError};

/// A subtree (or root) could not be listed. Isolated and converted to a skip.
#[derive(Debug, Error)]
pub enum TraversalError {
    #[error("permission denied listing {path}")]
    PermissionDenied { path: PathBuf },

    #[error("path vanished during walk: {path}")]
    Vanished { path: PathBuf },

    #[error("cannot walk {path}: {message}")]
    Other { path: PathBuf, message: String },
}

impl TraversalError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::PermissionDenied { path } | Self::Vanished { path } | Self::Other { path, .. } => {
                path
            }
        }
    }

    /// Classify a walkdir error. Errors without a path are attributed to `fallback`.
    pub fn from_walkdir(err: &walkdir::Error, fallback: &std::path::Path) -> Self {
        let path = err
            .path()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf());
        match err.io_error().map(std::io::Error::kind) {
            Some(std::io::ErrorKind::PermissionDenied) => Self::PermissionDenied { path },
            Some(std::io::ErrorKind::NotFound) => Self::Vanished { path },
            _ => Self::Other {
                path,
                message: err.to_string(),
            },
        }
    }
}

/// A single file's metadata could not be read. Counted as `failed`.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// File disappeared between enumeration and stat.
    #[error("file vanished before stat: {path}")]
    Vanished { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("read error while hashing {path}: {source}")]
    HashRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file time lies outside the range a record can carry.
    #[error("timestamp out of range: {path}")]
    TimestampOutOfRange { path: PathBuf },
}

impl ExtractionError {
    /// Create a stat-stage error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::Vanished { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// The broker could not be reached within the attempt budget. Fatal for the initial connect.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not connect to {endpoint} after {attempts} attempts: {last_error}")]
    Exhausted {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },

    #[error("connection manager is closed")]
    Closed,

    #[error("invalid connection transition: {event:?} while {from:?}")]
    InvalidTransition {
        from: ConnectionState,
        event: ConnectionEvent,
    },
}

/// One message could not be confirmed after a reconnect-and-retry. Counted as `failed`.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not encode record for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("broker unavailable, reconnect failed: {0}")]
    Reconnect(#[from] ConnectionError),

    #[error("broker rejected the message after retry (nack)")]
    Nacked,

    #[error("broker returned the message as unroutable")]
    Unroutable,

    #[error("no confirm within {0:?} after retry")]
    ConfirmTimeout(Duration),

    #[error("delivery failed after retry: {0}")]
    Transport(#[from] TransportError),
}
