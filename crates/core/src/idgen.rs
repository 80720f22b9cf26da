//! ID generation with reuse of released handles

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{self, AtomicU64};

/// Thread-safe ID generator
///
/// Released IDs are handed out again lowest-first before the counter grows,
/// which keeps chat-room ids small on long-running servers.
pub struct IdGenerator<T: Copy + Into<u64> + TryFrom<u64> + Ord> {
    released: Mutex<BTreeSet<T>>,
    next_id: AtomicU64,
}

impl<T: Copy + Into<u64> + TryFrom<u64> + Ord> IdGenerator<T> {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Counter starts at `first` (e.g. to keep 0 as a "no connection" value)
    pub fn starting_at(first: u64) -> Self {
        Self {
            released: Mutex::new(BTreeSet::new()),
            next_id: AtomicU64::new(first),
        }
    }

    /// Get the next available ID
    pub fn get_available_id(&self) -> T {
        if let Some(id) = self.released.lock().pop_first() {
            return id;
        }
        loop {
            let id = self.next_id.fetch_add(1, atomic::Ordering::Relaxed);
            if let Ok(id) = T::try_from(id) {
                return id;
            }
        }
    }

    /// Return an ID to the pool
    pub fn release(&self, id: T) {
        self.released.lock().insert(id);
    }
}

impl<T: Copy + Into<u64> + TryFrom<u64> + Ord> Default for IdGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}
