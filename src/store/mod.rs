//! Expiring Key-Value Store
//!
//! [`Store`] layers expiration, counters and prefix scans over a
//! [`StorageEngine`]. It keeps no data of its own: every read and write goes
//! straight to the engine, and the only in-memory state is the striped lock
//! table that serializes read-modify-write operations.
//!
//! ## Two kinds of keys
//!
//! - **Plain** keys ([`Store::set`], [`Store::get`], ...) hold the caller's
//!   bytes untouched.
//! - **Expiring** keys ([`Store::xset`], [`Store::xget`], ...) hold an
//!   [`Envelope`](crate::envelope::Envelope) carrying an absolute expiry.
//!
//! The engine cannot tell the two apart. Mixing plain and expiring calls on
//! one key is a caller error and surfaces as [`Error::EnvelopeDecode`].
//!
//! ## Lazy Expiry
//!
//! Nothing runs in the background to delete expired records. A point read
//! ([`Store::xget`], [`Store::ttl`]) that finds an expired record reports it
//! as absent and deletes it on the spot.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use ttlkv::{Remaining, Store};
//!
//! let store = Store::temporary()?;
//!
//! store.xset_with_ttl("session:42", "token", Duration::from_secs(3600))?;
//! assert_eq!(store.xget("session:42")?.as_deref(), Some(&b"token"[..]));
//! assert!(matches!(store.ttl("session:42")?, Remaining::Seconds(_)));
//!
//! assert_eq!(store.increment("visits")?, 1);
//! assert_eq!(store.find_keys("session:")?, vec!["session:42".to_string()]);
//! # Ok::<(), ttlkv::Error>(())
//! ```

mod counter;
mod expiring;
mod locks;
mod scan;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{Config, ExpireAtPolicy};
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::storage::{SledEngine, StorageEngine};

pub use expiring::Remaining;
use locks::LockTable;

/// Handle to an expiring key-value store.
///
/// Cloning is cheap; clones share the engine and the lock table, so a store
/// can be handed to as many threads as needed.
pub struct Store<E: StorageEngine = SledEngine> {
    engine: Arc<E>,
    locks: Arc<LockTable>,
    expire_at_policy: ExpireAtPolicy,
}

impl<E: StorageEngine> Clone for Store<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            locks: Arc::clone(&self.locks),
            expire_at_policy: self.expire_at_policy,
        }
    }
}

impl<E: StorageEngine> std::fmt::Debug for Store<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("lock_stripes", &self.locks.len())
            .field("expire_at_policy", &self.expire_at_policy)
            .finish()
    }
}

impl Store<SledEngine> {
    /// Opens (or creates) a store in the directory `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(&Config::with_path(path))
    }

    /// Opens a store backed by a temporary database, removed on drop.
    pub fn temporary() -> Result<Self> {
        Self::with_config(&Config::temporary())
    }

    /// Opens a store using `config`.
    pub fn with_config(config: &Config) -> Result<Self> {
        let engine = SledEngine::open(&config.engine)?;
        Ok(Self::with_engine(engine, config))
    }
}

impl<E: StorageEngine> Store<E> {
    /// Builds a store on top of an existing engine.
    pub fn with_engine(engine: E, config: &Config) -> Self {
        Self {
            engine: Arc::new(engine),
            locks: Arc::new(LockTable::new(config.lock_stripes)),
            expire_at_policy: config.expire_at_policy,
        }
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Flushes all writes to disk and releases this handle.
    pub fn close(self) -> Result<()> {
        self.engine.flush()?;
        info!("Store closed");
        Ok(())
    }

    // ========================================================================
    // PLAIN RECORDS
    // ========================================================================

    /// Reads the raw bytes stored at `key`.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.engine.get(key.as_bytes())?)
    }

    /// Reads the value at `key` as a UTF-8 string.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get(key)?
            .map(|value| into_string(key, value))
            .transpose()
    }

    /// Stores `value` at `key` without an envelope.
    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        Ok(self.engine.insert(key.as_bytes(), value.as_ref())?)
    }

    /// Checks whether `key` has any entry, plain or expiring.
    ///
    /// This looks at raw storage only; an expired record still counts.
    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.engine.contains(key.as_bytes())?)
    }

    /// Deletes `key`, whatever it holds, and reports whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.engine.remove(key.as_bytes())?)
    }

    // ========================================================================
    // Helpers shared by the expiring layer
    // ========================================================================

    /// Reads and decodes the record at `key`, expired or not.
    fn load(&self, key: &str) -> Result<Option<(Bytes, Envelope)>> {
        let Some(raw) = self.engine.get(key.as_bytes())? else {
            return Ok(None);
        };

        let envelope = Envelope::decode(raw.clone()).map_err(|source| Error::EnvelopeDecode {
            key: key.to_string(),
            source,
        })?;

        Ok(Some((raw, envelope)))
    }

    fn store_envelope(&self, key: &str, envelope: &Envelope) -> Result<()> {
        Ok(self.engine.insert(key.as_bytes(), &envelope.encode())?)
    }

    /// Best-effort removal of a record found expired.
    ///
    /// Only deletes if the key still holds `raw`; a value written since the
    /// read survives. Failures are logged and swallowed: the caller already
    /// has its answer, and the record reads as expired again next time.
    fn discard_expired(&self, key: &str, raw: &[u8]) {
        match self.engine.remove_if_eq(key.as_bytes(), raw) {
            Ok(true) => debug!(key, "Removed expired record"),
            Ok(false) => debug!(key, "Expired record replaced before removal"),
            Err(e) => warn!(key, error = %e, "Failed to remove expired record"),
        }
    }
}

fn into_string(key: &str, value: Bytes) -> Result<String> {
    String::from_utf8(value.to_vec()).map_err(|_| Error::InvalidUtf8 {
        key: key.to_string(),
    })
}

/// Current time in whole Unix seconds.
pub(crate) fn unix_now() -> i64 {
    unix_secs(SystemTime::now())
}

/// Converts an instant to Unix seconds, rounding toward negative infinity.
pub(crate) fn unix_secs(instant: SystemTime) -> i64 {
    match instant.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_secs()).unwrap_or(i64::MAX),
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
            if before.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}

/// Absolute expiry for a record written now with a time-to-live of `ttl`.
pub(crate) fn deadline_after(ttl: Duration) -> i64 {
    SystemTime::now()
        .checked_add(ttl)
        .map(unix_secs)
        .unwrap_or(i64::MAX)
}

/// Absolute expiry for a signed time-to-live in seconds.
pub(crate) fn deadline_after_secs(seconds: i64) -> i64 {
    if seconds >= 0 {
        deadline_after(Duration::from_secs(seconds.unsigned_abs()))
    } else {
        SystemTime::now()
            .checked_sub(Duration::from_secs(seconds.unsigned_abs()))
            .map(unix_secs)
            .unwrap_or(i64::MIN)
    }
}

/// Maps a computed expiry onto a value the envelope can carry.
///
/// `0` means "never expires", so instants at or before the epoch become `1`:
/// long past, and therefore expired.
#[inline]
pub(crate) fn clamp_expiry(expire_at: i64) -> i64 {
    expire_at.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_set_get_delete() {
        let store = Store::temporary().unwrap();

        assert_eq!(store.get("name").unwrap(), None);
        assert!(!store.exists("name").unwrap());

        store.set("name", "Ariz").unwrap();
        assert_eq!(store.get("name").unwrap(), Some(Bytes::from("Ariz")));
        assert_eq!(store.get_string("name").unwrap(), Some("Ariz".to_string()));
        assert!(store.exists("name").unwrap());

        assert!(store.delete("name").unwrap());
        assert_eq!(store.get("name").unwrap(), None);
        // Deleting again is fine
        assert!(!store.delete("name").unwrap());
    }

    #[test]
    fn test_get_string_rejects_binary() {
        let store = Store::temporary().unwrap();
        store.set("bin", [0xff, 0xfe]).unwrap();
        assert!(matches!(
            store.get_string("bin"),
            Err(Error::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_reopen_keeps_expiring_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let store = Store::open(&path).unwrap();
            store.xset("kept", "value").unwrap();
            store.close().unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.xget("kept").unwrap(), Some(Bytes::from("value")));
    }

    #[test]
    fn test_temporary_stores_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let store = Store::open(&path).unwrap();
            store.set("precious", "data").unwrap();
            store.close().unwrap();
        }

        {
            // Same configured path, but temporary
            let mut config = Config::with_path(&path);
            config.engine.temporary = true;
            let first = Store::with_config(&config).unwrap();
            let second = Store::temporary().unwrap();

            assert_eq!(first.get("precious").unwrap(), None);
            first.set("scratch", "1").unwrap();
            assert_eq!(second.get("scratch").unwrap(), None);
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get("precious").unwrap(), Some(Bytes::from("data")));
    }

    #[test]
    fn test_unix_secs() {
        assert_eq!(unix_secs(UNIX_EPOCH), 0);
        assert_eq!(unix_secs(UNIX_EPOCH + Duration::from_millis(1500)), 1);
        assert_eq!(unix_secs(UNIX_EPOCH - Duration::from_millis(1500)), -2);
        assert_eq!(unix_secs(UNIX_EPOCH - Duration::from_secs(3)), -3);
    }

    #[test]
    fn test_deadlines() {
        let now = unix_now();
        let later = deadline_after(Duration::from_secs(100));
        assert!(later >= now + 100 && later <= now + 101);

        let earlier = deadline_after_secs(-100);
        assert!(earlier <= now - 99 && earlier >= now - 101);

        assert_eq!(deadline_after(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_clamp_expiry() {
        assert_eq!(clamp_expiry(0), 1);
        assert_eq!(clamp_expiry(-50), 1);
        assert_eq!(clamp_expiry(1_700_000_000), 1_700_000_000);
    }
}
