//! Expiring record access: reads, writes and lifetime management.
//!
//! At access time every key is in one of three states:
//!
//! ```text
//!   Absent ──xset──> Live ──time passes──> Expired
//!     ▲                                       │
//!     └──────── xget / ttl (lazy delete) ─────┘
//! ```

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tracing::{debug, trace};

use super::{
    clamp_expiry, deadline_after, deadline_after_secs, into_string, unix_now, unix_secs, Store,
};
use crate::config::ExpireAtPolicy;
use crate::envelope::{Envelope, NO_EXPIRY};
use crate::error::{Error, Result};
use crate::storage::StorageEngine;

/// Remaining lifetime of a key, as reported by [`Store::ttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// No record, or the record has expired
    Absent,
    /// The record never expires
    NoExpiry,
    /// Whole seconds left before the record expires
    Seconds(u64),
}

impl Remaining {
    /// Redis-style encoding: `-2` absent, `-1` no expiry, otherwise seconds left.
    pub fn as_secs(&self) -> i64 {
        match self {
            Remaining::Absent => -2,
            Remaining::NoExpiry => -1,
            Remaining::Seconds(secs) => i64::try_from(*secs).unwrap_or(i64::MAX),
        }
    }
}

impl<E: StorageEngine> Store<E> {
    /// Reads the payload of the expiring record at `key`.
    ///
    /// Returns `None` if the key is missing or its record has expired. An
    /// expired record is deleted before returning.
    ///
    /// # Errors
    ///
    /// [`Error::EnvelopeDecode`] if the key holds a plain value.
    pub fn xget(&self, key: &str) -> Result<Option<Bytes>> {
        let Some((raw, envelope)) = self.load(key)? else {
            return Ok(None);
        };

        if envelope.is_expired_at(unix_now()) {
            trace!(key, expire_at = envelope.expire_at, "Record expired on read");
            self.discard_expired(key, &raw);
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }

    /// Like [`Store::xget`], decoding the payload as UTF-8.
    pub fn xget_string(&self, key: &str) -> Result<Option<String>> {
        self.xget(key)?
            .map(|payload| into_string(key, payload))
            .transpose()
    }

    /// Stores `payload` at `key` with no expiry, replacing any previous value.
    pub fn xset(&self, key: &str, payload: impl AsRef<[u8]>) -> Result<()> {
        self.write_record(key, payload.as_ref(), NO_EXPIRY)
    }

    /// Stores `payload` at `key`, expiring `ttl` from now.
    ///
    /// A zero `ttl` writes a record that is already expired.
    pub fn xset_with_ttl(&self, key: &str, payload: impl AsRef<[u8]>, ttl: Duration) -> Result<()> {
        self.write_record(key, payload.as_ref(), clamp_expiry(deadline_after(ttl)))
    }

    /// Stores `payload` at `key`, expiring `seconds` from now.
    ///
    /// Zero or negative `seconds` write a record that is already expired.
    pub fn xset_with_ttl_secs(
        &self,
        key: &str,
        payload: impl AsRef<[u8]>,
        seconds: i64,
    ) -> Result<()> {
        self.write_record(
            key,
            payload.as_ref(),
            clamp_expiry(deadline_after_secs(seconds)),
        )
    }

    fn write_record(&self, key: &str, payload: &[u8], expire_at: i64) -> Result<()> {
        trace!(key, expire_at, len = payload.len(), "Writing expiring record");
        let envelope = Envelope::expiring(Bytes::copy_from_slice(payload), expire_at);
        self.store_envelope(key, &envelope)
    }

    /// Reports how long the record at `key` has left to live.
    ///
    /// An expired record is deleted and reported as [`Remaining::Absent`].
    pub fn ttl(&self, key: &str) -> Result<Remaining> {
        let Some((raw, envelope)) = self.load(key)? else {
            return Ok(Remaining::Absent);
        };

        if !envelope.has_expiry() {
            return Ok(Remaining::NoExpiry);
        }

        let remaining = envelope.expire_at.saturating_sub(unix_now());
        if remaining <= 0 {
            self.discard_expired(key, &raw);
            return Ok(Remaining::Absent);
        }

        Ok(Remaining::Seconds(remaining.unsigned_abs()))
    }

    /// Sets the record at `key` to expire at `instant`, keeping its payload.
    ///
    /// With [`ExpireAtPolicy::PreserveRaw`] the stored record is updated even
    /// if it already expired, so a future `instant` makes the old payload
    /// readable again. With [`ExpireAtPolicy::RejectExpired`] an expired record
    /// is deleted and the call fails with [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if nothing is stored at `key`
    /// - [`Error::EnvelopeDecode`] if the key holds a plain value
    pub fn expire_at(&self, key: &str, instant: SystemTime) -> Result<()> {
        self.set_expiry(key, clamp_expiry(unix_secs(instant)))
    }

    /// Sets the record at `key` to expire `ttl` from now.
    pub fn expire_in(&self, key: &str, ttl: Duration) -> Result<()> {
        self.set_expiry(key, clamp_expiry(deadline_after(ttl)))
    }

    /// Sets the record at `key` to expire `seconds` from now.
    pub fn expire_in_secs(&self, key: &str, seconds: i64) -> Result<()> {
        self.set_expiry(key, clamp_expiry(deadline_after_secs(seconds)))
    }

    fn set_expiry(&self, key: &str, expire_at: i64) -> Result<()> {
        let _guard = self.locks.lock(key);

        let Some((raw, mut envelope)) = self.load(key)? else {
            return Err(Error::NotFound(key.to_string()));
        };

        if self.expire_at_policy == ExpireAtPolicy::RejectExpired
            && envelope.is_expired_at(unix_now())
        {
            self.discard_expired(key, &raw);
            return Err(Error::NotFound(key.to_string()));
        }

        debug!(key, from = envelope.expire_at, to = expire_at, "Updating expiry");
        envelope.expire_at = expire_at;
        self.store_envelope(key, &envelope)
    }
}
