//! Prefix scans.
//!
//! Both scans walk the engine in ascending key order, starting at the prefix
//! and stopping at the first key past it. Scanning is read-only: expired
//! records are skipped, never deleted.

use tracing::trace;

use super::{unix_now, Store};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::storage::StorageEngine;

impl<E: StorageEngine> Store<E> {
    /// Returns every key starting with `prefix`, plain or expiring, expired or not.
    pub fn find_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self.engine.keys_with_prefix(prefix.as_bytes())?;
        trace!(prefix, found = keys.len(), "Prefix scan finished");
        Ok(keys.iter().map(|key| key_to_string(key)).collect())
    }

    /// Returns keys starting with `prefix` that hold a live expiring record.
    ///
    /// Plain values and expired records are left out of the result.
    pub fn find_live_expiring_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.engine.entries_with_prefix(prefix.as_bytes())?;
        let now = unix_now();

        let keys: Vec<String> = entries
            .into_iter()
            .filter(|(_, raw)| {
                Envelope::decode(raw.clone())
                    .map(|envelope| !envelope.is_expired_at(now))
                    .unwrap_or(false)
            })
            .map(|(key, _)| key_to_string(&key))
            .collect();

        trace!(prefix, live = keys.len(), "Live expiring key scan finished");
        Ok(keys)
    }
}

fn key_to_string(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
