//! Maintenance Module
//!
//! Space held by overwritten and deleted records is returned by the storage
//! engine on request. This module forwards that request and can run it on a
//! schedule.
//!
//! - [`Store::reclaim`]: one reclaim pass, on demand
//! - [`GcScheduler`]: background Tokio task calling `reclaim` periodically
//!
//! Neither touches expiring records. Expired keys are still only removed when
//! they are read.

pub mod gc;

use tracing::debug;

use crate::error::Result;
use crate::storage::{ReclaimOutcome, StorageEngine};
use crate::store::Store;

pub use gc::{start_gc_scheduler, GcScheduler};

impl<E: StorageEngine> Store<E> {
    /// Asks the engine to give back space held by obsolete data.
    ///
    /// `discard_ratio` must lie strictly between `0.0` and `1.0`. Finding
    /// nothing to reclaim is a successful outcome, not an error.
    pub fn reclaim(&self, discard_ratio: f64) -> Result<ReclaimOutcome> {
        let outcome = self.engine().reclaim(discard_ratio)?;
        debug!(discard_ratio, ?outcome, "Reclaim finished");
        Ok(outcome)
    }
}
