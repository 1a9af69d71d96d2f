//! Store Configuration
//!
//! Configuration is layered, lowest priority first:
//!
//! 1. Hardcoded defaults ([`Config::default`])
//! 2. An optional TOML file
//! 3. `TTLKV__*` environment variables (`TTLKV__ENGINE__PATH=/var/lib/ttlkv`)
//!
//! ## Example file
//!
//! ```toml
//! lock_stripes = 128
//! expire_at_policy = "reject_expired"
//!
//! [engine]
//! path = "/var/lib/ttlkv"
//! cache_capacity = 67108864
//!
//! [gc]
//! discard_ratio = 0.5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File};
use serde::Deserialize;

use crate::error::Result;

/// Default number of lock stripes guarding read-modify-write operations.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Top-level store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage engine settings
    pub engine: EngineConfig,

    /// Number of stripes in the per-key lock table
    pub lock_stripes: usize,

    /// How `expire_at` treats a key whose record is already expired
    pub expire_at_policy: ExpireAtPolicy,

    /// Background GC scheduler settings
    pub gc: GcConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            lock_stripes: DEFAULT_LOCK_STRIPES,
            expire_at_policy: ExpireAtPolicy::default(),
            gc: GcConfig::default(),
        }
    }
}

impl Config {
    /// Configuration for a throwaway database that lives only as long as the store.
    pub fn temporary() -> Self {
        let mut config = Self::default();
        config.engine.temporary = true;
        config
    }

    /// Configuration for a database at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.engine.path = path.into();
        config
    }

    /// Loads configuration from defaults, an optional TOML file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("TTLKV")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

/// Settings forwarded to the sled storage engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database directory (ignored when `temporary` is set)
    pub path: PathBuf,

    /// Keep the database in a temporary location removed on drop
    pub temporary: bool,

    /// Page cache size in bytes
    pub cache_capacity: u64,

    /// Background flush interval; `None` flushes only on explicit request
    pub flush_every_ms: Option<u64>,

    /// Compress pages on disk
    pub use_compression: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ttlkv-data"),
            temporary: false,
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(500),
            use_compression: true,
        }
    }
}

/// Behavior of `expire_at` on a record that is already logically expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpireAtPolicy {
    /// Rewrite the expiry of whatever is stored, even if it already expired.
    /// Setting a future instant brings the stale payload back.
    #[default]
    PreserveRaw,

    /// Treat an expired record as missing: delete it and fail with `NotFound`.
    RejectExpired,
}

/// Configuration for the background GC scheduler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Base interval between reclaim runs (default: 5 minutes)
    #[serde(with = "duration_secs")]
    pub base_interval: Duration,

    /// Minimum interval between reclaim runs (default: 30s)
    #[serde(with = "duration_secs")]
    pub min_interval: Duration,

    /// Maximum interval between reclaim runs (default: 1 hour)
    #[serde(with = "duration_secs")]
    pub max_interval: Duration,

    /// Discard ratio passed to each reclaim
    pub discard_ratio: f64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(5 * 60),
            min_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(60 * 60),
            discard_ratio: 0.5,
        }
    }
}

/// Durations are written as whole seconds in config files.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
