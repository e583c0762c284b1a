//! Error types shared between the server and the observer.
//!
//! The `PulseError` enum unifies the failure cases of the ingestion pipeline:
//! I/O, serialization, source fetches, feed parsing, storage, lock poisoning,
//! configuration and unknown observers or sources, so every crate in the workspace can
//! propagate a single error type with `?`.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by server and observer.
#[derive(Error, Debug)]
pub enum PulseError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Malformed identifier in a command or sources file.
    #[error("Invalid identifier: {0}")]
    Uuid(#[from] uuid::Error),

    /// Transport-level failure while pulling a source (connect, status, body).
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        /// URL that was being pulled.
        url: String,
        /// Transport error rendered as text.
        message: String,
    },

    /// The fetched document is not a valid RSS/Atom feed.
    #[error("Feed parse error: {0}")]
    FeedParse(String),

    /// A storage read, write or commit failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// Invalid or missing configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The observer is not (or no longer) subscribed.
    #[error("Unknown observer: {0}")]
    UnknownObserver(String),

    /// No data source with the given identity exists.
    #[error("Unknown data source: {0}")]
    UnknownSource(String),
}

impl<T> From<PoisonError<T>> for PulseError {
    fn from(err: PoisonError<T>) -> Self {
        PulseError::MutexLock(err.to_string())
    }
}
