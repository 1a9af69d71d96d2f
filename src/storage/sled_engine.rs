//! sled-backed storage engine.

use bytes::Bytes;
use tracing::{debug, info, instrument, trace, warn};

use super::{ReclaimOutcome, StorageEngine};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// [`StorageEngine`] implementation on top of a sled database.
pub struct SledEngine {
    db: sled::Db,
}

impl std::fmt::Debug for SledEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledEngine")
            .field("entries", &self.db.len())
            .field("recovered", &self.db.was_recovered())
            .finish()
    }
}

impl SledEngine {
    /// Opens (or creates) a database using `config`.
    ///
    /// A temporary database ignores `config.path` and lives in its own
    /// private location, so it never sees or removes an on-disk database.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut sled_config = sled::Config::default().temporary(config.temporary);
        // sled deletes the configured path on drop when `temporary` is set
        if !config.temporary {
            sled_config = sled_config.path(&config.path);
        }

        let db = sled_config
            .cache_capacity(config.cache_capacity)
            .flush_every_ms(config.flush_every_ms)
            .use_compression(config.use_compression)
            .open()
            .map_err(|e| {
                warn!(path = ?config.path, error = %e, "Failed to open database");
                e
            })?;

        if config.temporary {
            info!("Opened temporary database");
        } else {
            info!(path = ?config.path, recovered = db.was_recovered(), "Opened database");
        }

        Ok(Self { db })
    }

    /// Opens a temporary database removed when the engine is dropped.
    pub fn temporary() -> Result<Self, EngineError> {
        Self::open(&EngineConfig {
            temporary: true,
            ..EngineConfig::default()
        })
    }
}

impl StorageEngine for SledEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, EngineError> {
        Ok(self
            .db
            .get(key)?
            .map(|ivec| Bytes::copy_from_slice(ivec.as_ref())))
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<bool, EngineError> {
        Ok(self.db.remove(key)?.is_some())
    }

    fn remove_if_eq(&self, key: &[u8], expected: &[u8]) -> Result<bool, EngineError> {
        let swapped = self
            .db
            .compare_and_swap(key, Some(expected), None as Option<&[u8]>)?;
        Ok(swapped.is_ok())
    }

    fn contains(&self, key: &[u8]) -> Result<bool, EngineError> {
        Ok(self.db.contains_key(key)?)
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        let mut keys = Vec::new();
        for key in self.db.scan_prefix(prefix).keys() {
            keys.push(key?.to_vec());
        }
        Ok(keys)
    }

    fn entries_with_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Bytes)>, EngineError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (key, value) = item?;
            entries.push((key.to_vec(), Bytes::copy_from_slice(value.as_ref())));
        }
        Ok(entries)
    }

    /// sled cleans fragmented segments while flushing; there is no separate
    /// value log to rewrite, so the ratio only gates the request.
    #[instrument(skip(self))]
    fn reclaim(&self, discard_ratio: f64) -> Result<ReclaimOutcome, EngineError> {
        if !(discard_ratio > 0.0 && discard_ratio < 1.0) {
            return Err(EngineError::InvalidDiscardRatio(discard_ratio));
        }

        let before = self.db.size_on_disk()?;
        let flushed = self.db.flush()?;
        let after = self.db.size_on_disk()?;
        trace!(before, after, flushed, "Reclaim pass finished");

        if after < before {
            let bytes = before - after;
            debug!(bytes, "Reclaimed disk space");
            Ok(ReclaimOutcome::Reclaimed { bytes })
        } else {
            Ok(ReclaimOutcome::NothingToReclaim)
        }
    }

    fn flush(&self) -> Result<(), EngineError> {
        let flushed = self.db.flush()?;
        trace!(bytes = flushed, "Flushed database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SledEngine {
        SledEngine::temporary().unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let engine = engine();

        assert_eq!(engine.get(b"key").unwrap(), None);
        engine.insert(b"key", b"value").unwrap();
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("value")));
        assert!(engine.contains(b"key").unwrap());

        assert!(engine.remove(b"key").unwrap());
        assert_eq!(engine.get(b"key").unwrap(), None);
        // Already gone
        assert!(!engine.remove(b"key").unwrap());
    }

    #[test]
    fn test_remove_if_eq() {
        let engine = engine();
        engine.insert(b"key", b"old").unwrap();

        assert!(!engine.remove_if_eq(b"key", b"other").unwrap());
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("old")));

        assert!(engine.remove_if_eq(b"key", b"old").unwrap());
        assert_eq!(engine.get(b"key").unwrap(), None);

        // Missing key never matches
        assert!(!engine.remove_if_eq(b"key", b"old").unwrap());
    }

    #[test]
    fn test_prefix_scan_is_ordered() {
        let engine = engine();
        for key in ["user:2", "order:1", "user:1", "user", "users:9"] {
            engine.insert(key.as_bytes(), b"v").unwrap();
        }

        let keys = engine.keys_with_prefix(b"user:").unwrap();
        assert_eq!(keys, vec![b"user:1".to_vec(), b"user:2".to_vec()]);

        let entries = engine.entries_with_prefix(b"order:").unwrap();
        assert_eq!(entries, vec![(b"order:1".to_vec(), Bytes::from("v"))]);

        assert_eq!(engine.keys_with_prefix(b"").unwrap().len(), 5);
    }

    #[test]
    fn test_reclaim_rejects_bad_ratio() {
        let engine = engine();
        for ratio in [0.0, 1.0, -0.5, 2.0, f64::NAN] {
            assert!(matches!(
                engine.reclaim(ratio),
                Err(EngineError::InvalidDiscardRatio(_))
            ));
        }
        assert!(engine.reclaim(0.5).is_ok());
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            path: dir.path().join("db"),
            ..EngineConfig::default()
        };

        {
            let engine = SledEngine::open(&config).unwrap();
            engine.insert(b"durable", b"yes").unwrap();
            engine.flush().unwrap();
        }

        let engine = SledEngine::open(&config).unwrap();
        assert_eq!(engine.get(b"durable").unwrap(), Some(Bytes::from("yes")));
    }

    #[test]
    fn test_temporary_ignores_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            path: dir.path().join("db"),
            ..EngineConfig::default()
        };

        {
            let engine = SledEngine::open(&config).unwrap();
            engine.insert(b"precious", b"data").unwrap();
            engine.flush().unwrap();
        }

        let temporary_config = EngineConfig {
            temporary: true,
            ..config.clone()
        };
        {
            let first = SledEngine::open(&temporary_config).unwrap();
            let second = SledEngine::open(&temporary_config).unwrap();
            assert_eq!(first.get(b"precious").unwrap(), None);

            first.insert(b"scratch", b"1").unwrap();
            assert_eq!(second.get(b"scratch").unwrap(), None);
        }

        // The real database survives the temporary ones
        assert!(config.path.exists());
        let engine = SledEngine::open(&config).unwrap();
        assert_eq!(engine.get(b"precious").unwrap(), Some(Bytes::from("data")));
    }
}
