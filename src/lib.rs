//! # ttlkv - Expiring Records on an Embedded Key-Value Store
//!
//! ttlkv adds per-key expiration, atomic counters and prefix scans on top of
//! an embedded, ordered, transactional key-value engine (sled). Records carry
//! their own absolute expiry; nothing has to run in the background for
//! expired keys to disappear.
//!
//! ## Features
//!
//! - **Expiring records**: values wrapped in a small binary envelope holding
//!   a Unix-seconds deadline
//! - **Lazy expiry**: point reads treat expired records as absent and delete them
//! - **Atomic counters**: read-modify-write under per-key striped locks
//! - **Prefix scans**: ordered key listings, optionally limited to live records
//! - **Space reclaim**: on demand or from a background Tokio task
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                ttlkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │  ttlkv CLI  │───>│  Command    │───>│            Store             │ │
//! │  │  (shell)    │    │  Handler    │    │  plain │ expiring │ counters │ │
//! │  └─────────────┘    └─────────────┘    │  scans │ reclaim  │          │ │
//! │                                        └──────────────┬───────────────┘ │
//! │  ┌─────────────┐    ┌─────────────┐                   │                 │
//! │  │  Envelope   │<───│  LockTable  │<──────────────────┤                 │
//! │  │  codec      │    │  (stripes)  │                   ▼                 │
//! │  └─────────────┘    └─────────────┘    ┌──────────────────────────────┐ │
//! │                                        │   StorageEngine (SledEngine) │ │
//! │                                        └──────────────────────────────┘ │
//! │                                                       ▲                 │
//! │                     ┌─────────────────────────────────┴───────────────┐ │
//! │                     │           GcScheduler                           │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Duration;
//! use ttlkv::{Remaining, Store};
//!
//! let store = Store::temporary()?;
//!
//! // Expiring records
//! store.xset_with_ttl("session:1", "token", Duration::from_secs(60))?;
//! assert_eq!(store.xget_string("session:1")?.as_deref(), Some("token"));
//! assert!(matches!(store.ttl("session:1")?, Remaining::Seconds(_)));
//!
//! // Counters
//! store.increment_by("hits", 5)?;
//! assert_eq!(store.decrement("hits")?, 4);
//!
//! // Prefix scans
//! assert_eq!(store.find_live_expiring_keys("session:")?, vec!["session:1"]);
//!
//! store.close()?;
//! # Ok::<(), ttlkv::Error>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`envelope`]: Binary format of expiring records
//! - [`storage`]: The engine trait and its sled implementation
//! - [`store`]: Plain, expiring, counter and scan operations
//! - [`maintenance`]: Space reclaim and its background scheduler
//! - [`commands`]: Text command interface used by the shell
//! - [`config`]: Layered configuration (defaults, TOML file, environment)
//! - [`error`]: Error types
//!
//! ## Design Highlights
//!
//! ### Lock Striping
//!
//! Read-modify-write operations (counters, expiry updates) lock one of 64
//! stripes chosen by hashing the key, so updates to different keys rarely
//! contend while updates to one key are serialized.
//!
//! ### Lazy Expiry Without Lost Writes
//!
//! A read that finds an expired record deletes it with compare-and-delete:
//! if another writer stored a fresh value in between, the fresh value stays.

pub mod commands;
pub mod config;
pub mod envelope;
pub mod error;
pub mod maintenance;
pub mod storage;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{Config, EngineConfig, ExpireAtPolicy, GcConfig};
pub use envelope::Envelope;
pub use error::{DecodeError, EngineError, Error, Result};
pub use maintenance::{start_gc_scheduler, GcScheduler};
pub use storage::{ReclaimOutcome, SledEngine, StorageEngine};
pub use store::{Remaining, Store};

/// Version of ttlkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
