//! Error Types
//!
//! Every fallible operation in ttlkv returns [`Result<T>`]. The variants map
//! one-to-one onto the failure classes callers need to tell apart:
//!
//! - [`Error::Engine`]: the storage engine failed (I/O, corruption, closed handle)
//! - [`Error::EnvelopeDecode`]: the bytes under a key are not an expiring record
//! - [`Error::Parse`]: a counter key holds something that is not an integer
//! - [`Error::NotFound`]: a read-modify-write targeted a missing key
//! - [`Error::Overflow`]: counter arithmetic left the `i64` range
//!
//! Reads never report a missing key as an error; they return `None` instead.

use std::result;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = result::Result<T, Error>;

/// Top-level error returned by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("value at key '{key}' is not an expiring record: {source}")]
    EnvelopeDecode {
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error("value at key '{key}' is not an integer: {value:?}")]
    Parse { key: String, value: String },

    #[error("key '{0}' not found")]
    NotFound(String),

    #[error("counter at key '{key}' would overflow from {current}")]
    Overflow { key: String, current: i64 },

    #[error("value at key '{key}' is not valid UTF-8")]
    InvalidUtf8 { key: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Returns true if this error is a missing-key error from a read-modify-write.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Failure reported by the underlying storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage engine error: {0}")]
    Sled(#[from] sled::Error),

    #[error("invalid discard ratio {0}: must lie strictly between 0.0 and 1.0")]
    InvalidDiscardRatio(f64),
}

/// Bytes could not be interpreted as an expiring-record envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("envelope truncated: {0} bytes")]
    Truncated(usize),

    #[error("missing envelope magic")]
    BadMagic,

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("payload length {declared} does not match remaining {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },
}
