// src/error.rs
//! Error types for the nature tracker

use crate::session::TrackState;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failures of the key-value persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing the value would exceed the store's capacity.
    #[error("storage quota exceeded writing '{key}': {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { key: String, needed: u64, quota: u64 },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// Failures of a position source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The device cannot provide positions at all.
    #[error("location not supported: {0}")]
    Unsupported(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("no location support: {0}")]
    NoLocationSupport(String),

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: TrackState,
    },

    #[error("no known position yet; wait for a GPS fix")]
    NoKnownPosition,

    /// The route could not be persisted; the in-memory route is intact.
    #[error("could not save the route, storage may be full: {0}")]
    PersistenceQuotaExceeded(StoreError),

    #[error("corrupt backup: {0}")]
    CorruptBackup(String),

    #[error("invalid share payload: {0}")]
    InvalidSharePayload(String),

    #[error("no saved session at index {0}")]
    SessionNotFound(usize),

    #[error("unsupported media file: {0}")]
    UnsupportedMedia(String),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for TrackerError {
    fn from(error: StoreError) -> Self {
        if error.is_quota() {
            TrackerError::PersistenceQuotaExceeded(error)
        } else {
            TrackerError::Store(error)
        }
    }
}
