//! Storage Engine Module
//!
//! The expiring layer never touches disk itself. It talks to an embedded,
//! ordered key-value engine through the [`StorageEngine`] trait, which exposes
//! exactly what the layer needs: point reads and writes, ordered prefix
//! iteration, space reclamation and flushing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │     expiring records · counters · prefix scans · GC         │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │ StorageEngine
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SledEngine                            │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────┐    │
//! │  │ get/insert│ │  remove   │ │scan_prefix│ │   flush   │    │
//! │  └───────────┘ └───────────┘ └───────────┘ └───────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-key operations are atomic in the engine; nothing here adds locking.

pub mod sled_engine;

use bytes::Bytes;

use crate::error::EngineError;

pub use sled_engine::SledEngine;

/// Result of a reclaim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// Space was returned to the filesystem
    Reclaimed { bytes: u64 },
    /// The engine had nothing worth rewriting
    NothingToReclaim,
}

impl ReclaimOutcome {
    /// Returns true if any space was freed.
    pub fn reclaimed_any(&self) -> bool {
        matches!(self, ReclaimOutcome::Reclaimed { .. })
    }
}

/// The contract an embedded ordered key-value engine must satisfy.
///
/// Implementations must be safe to share across threads; every method is a
/// self-contained, individually atomic operation.
#[cfg_attr(test, mockall::automock)]
pub trait StorageEngine: Send + Sync + 'static {
    /// Reads the value stored at `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, EngineError>;

    /// Writes `value` at `key`, replacing anything stored there.
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError>;

    /// Removes `key`, returning whether it held a value.
    ///
    /// Removing a missing key is not an error.
    fn remove(&self, key: &[u8]) -> Result<bool, EngineError>;

    /// Removes `key` only if it still holds exactly `expected`.
    ///
    /// Returns false, leaving the entry untouched, when the value changed.
    fn remove_if_eq(&self, key: &[u8], expected: &[u8]) -> Result<bool, EngineError>;

    /// Checks whether `key` has an entry.
    fn contains(&self, key: &[u8]) -> Result<bool, EngineError>;

    /// Returns every key starting with `prefix`, in ascending byte order.
    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, EngineError>;

    /// Returns every entry whose key starts with `prefix`, in ascending key order.
    fn entries_with_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Bytes)>, EngineError>;

    /// Asks the engine to give back space held by obsolete data.
    fn reclaim(&self, discard_ratio: f64) -> Result<ReclaimOutcome, EngineError>;

    /// Makes all completed writes durable.
    fn flush(&self) -> Result<(), EngineError>;
}
