//! Striped lock table for read-modify-write operations.
//!
//! Counter updates and `expire_at` read a record, change it and write it
//! back. Two such operations on the same key must not interleave, or one
//! update is lost. Instead of one global lock, keys are hashed onto a fixed
//! set of stripes: the same key always maps to the same stripe, while
//! unrelated keys rarely contend.

use std::hash::{DefaultHasher, Hash, Hasher};

use parking_lot::{Mutex, MutexGuard};

pub(crate) struct LockTable {
    stripes: Box<[Mutex<()>]>,
}

impl LockTable {
    /// Creates a table with `stripes` locks (at least one).
    pub(crate) fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    #[inline]
    fn stripe_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.stripes.len()
    }

    /// Blocks until the stripe owning `key` is free.
    ///
    /// Hold the guard from before the read until after the write commits.
    pub(crate) fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_index(key)].lock()
    }

    pub(crate) fn len(&self) -> usize {
        self.stripes.len()
    }
}

impl std::fmt::Debug for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTable")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}
