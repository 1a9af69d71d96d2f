//! Background Reclaim Scheduler
//!
//! Runs [`Store::reclaim`] periodically on a Tokio task so long-running
//! processes give disk space back without the caller scheduling it.
//!
//! ## Design
//!
//! The scheduler:
//! 1. Sleeps for the current interval (starts at `base_interval`)
//! 2. Runs one reclaim pass on the blocking thread pool
//! 3. Adjusts the interval from the outcome
//! 4. Logs what happened
//!
//! ## Adaptive Frequency
//!
//! A pass that reclaimed space halves the interval, down to `min_interval`.
//! A pass that found nothing doubles it, up to `max_interval`. Failures are
//! logged and leave the interval unchanged.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::config::GcConfig;
use crate::storage::{ReclaimOutcome, StorageEngine};
use crate::store::Store;

/// A handle to the running reclaim scheduler.
///
/// When this handle is dropped, the scheduler task will be stopped.
#[derive(Debug)]
pub struct GcScheduler {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl GcScheduler {
    /// Starts the scheduler as a background task.
    ///
    /// Must be called from within a Tokio runtime. The scheduler stops when
    /// the returned handle is dropped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ttlkv::{GcConfig, GcScheduler, Store};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> ttlkv::Result<()> {
    /// let store = Store::open("./data")?;
    /// let gc = GcScheduler::start(store.clone(), GcConfig::default());
    ///
    /// // Reclaim runs in the background...
    ///
    /// drop(gc);
    /// # Ok(())
    /// # }
    /// ```
    pub fn start<E: StorageEngine>(store: Store<E>, config: GcConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_secs = config.base_interval.as_secs(),
            discard_ratio = config.discard_ratio,
            "Background reclaim scheduler started"
        );

        tokio::spawn(gc_loop(store, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the scheduler.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background reclaim scheduler stopped");
    }
}

impl Drop for GcScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main scheduler loop.
async fn gc_loop<E: StorageEngine>(
    store: Store<E>,
    config: GcConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Reclaim scheduler received shutdown signal");
                    return;
                }
            }
        }

        let pass_store = store.clone();
        let ratio = config.discard_ratio;
        let outcome = match tokio::task::spawn_blocking(move || pass_store.reclaim(ratio)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(error = %e, "Reclaim pass failed");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Reclaim task panicked or was cancelled");
                continue;
            }
        };

        current_interval = next_interval(current_interval, outcome, &config);

        match outcome {
            ReclaimOutcome::Reclaimed { bytes } => debug!(
                bytes,
                next_interval_ms = current_interval.as_millis(),
                "Space reclaimed, speeding up scheduler"
            ),
            ReclaimOutcome::NothingToReclaim => trace!(
                next_interval_ms = current_interval.as_millis(),
                "Nothing to reclaim, slowing down scheduler"
            ),
        }
    }
}

fn next_interval(current: Duration, outcome: ReclaimOutcome, config: &GcConfig) -> Duration {
    match outcome {
        ReclaimOutcome::Reclaimed { .. } => (current / 2).max(config.min_interval),
        ReclaimOutcome::NothingToReclaim => current.saturating_mul(2).min(config.max_interval),
    }
}

/// Starts the reclaim scheduler with default configuration.
pub fn start_gc_scheduler<E: StorageEngine>(store: Store<E>) -> GcScheduler {
    GcScheduler::start(store, GcConfig::default())
}
