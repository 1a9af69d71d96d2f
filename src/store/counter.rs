//! Atomic counters stored as expiring records.
//!
//! A counter is an expiring record whose payload is the base-10 text of an
//! `i64`. Each update reads the current value, applies the delta and writes
//! the result while holding the key's lock stripe, so concurrent updates to
//! one key never lose an increment.
//!
//! - A missing key, an empty payload or an expired record counts as `0`;
//!   the result is written as a permanent counter.
//! - A live counter keeps its expiry across updates.
//! - Non-numeric payloads and overflow abort the update without writing.

use bytes::Bytes;
use tracing::trace;

use super::{unix_now, Store};
use crate::envelope::{Envelope, NO_EXPIRY};
use crate::error::{Error, Result};
use crate::storage::StorageEngine;

impl<E: StorageEngine> Store<E> {
    /// Increments the counter at `key` by one and returns the new value.
    pub fn increment(&self, key: &str) -> Result<i64> {
        self.increment_by(key, 1)
    }

    /// Decrements the counter at `key` by one and returns the new value.
    pub fn decrement(&self, key: &str) -> Result<i64> {
        self.increment_by(key, -1)
    }

    /// Adds `delta` to the counter at `key` and returns the new value.
    ///
    /// An expired counter restarts from `0` and the result is permanent.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`] if the stored payload is not an integer
    /// - [`Error::Overflow`] if the result does not fit in an `i64`
    /// - [`Error::EnvelopeDecode`] if the key holds a plain value
    pub fn increment_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.update_counter(key, |current| current.checked_add(delta))
    }

    /// Subtracts `delta` from the counter at `key` and returns the new value.
    pub fn decrement_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.update_counter(key, |current| current.checked_sub(delta))
    }

    fn update_counter(&self, key: &str, apply: impl FnOnce(i64) -> Option<i64>) -> Result<i64> {
        let _guard = self.locks.lock(key);

        let (current, expire_at) = match self.load(key)? {
            Some((_, envelope)) if !envelope.is_expired_at(unix_now()) => {
                (parse_counter(key, &envelope.payload)?, envelope.expire_at)
            }
            _ => (0, NO_EXPIRY),
        };

        let next = apply(current).ok_or_else(|| Error::Overflow {
            key: key.to_string(),
            current,
        })?;

        let envelope = Envelope::expiring(Bytes::from(next.to_string()), expire_at);
        self.store_envelope(key, &envelope)?;

        trace!(key, current, next, "Counter updated");
        Ok(next)
    }
}

/// Parses a counter payload; an empty payload is `0`.
fn parse_counter(key: &str, payload: &[u8]) -> Result<i64> {
    if payload.is_empty() {
        return Ok(0);
    }

    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::Parse {
            key: key.to_string(),
            value: String::from_utf8_lossy(payload).into_owned(),
        })
}
