//! The shared set of process ids currently owned by a monitoring chain.
//!
//! A pid may be tracked by at most one chain at a time: adoption goes
//! through [`TrackingRegistry::add`], which refuses pids that are already
//! present, and whichever phase finishes (or fails) for a pid removes it.
//! The registry is the only mutable state shared between chains; every
//! critical section is a short map operation under one mutex.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

pub struct TrackingRegistry {
    pids: Mutex<HashSet<u32>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self {
            pids: Mutex::new(HashSet::new()),
        }
    }

    /// Begins tracking `pid`.  Returns false when the pid is already owned
    /// by another chain, in which case the caller must not adopt it.
    pub fn add(&self, pid: u32) -> bool {
        self.lock().insert(pid)
    }

    /// Stops tracking `pid`.  Returns false when it was not tracked.
    pub fn remove(&self, pid: u32) -> bool {
        self.lock().remove(&pid)
    }

    /// Returns true when any pid in `pids` is currently tracked.
    pub fn contains_any(&self, pids: &HashSet<u32>) -> bool {
        let tracked = self.lock();
        pids.iter().any(|pid| tracked.contains(pid))
    }

    /// Returns a copy of the currently tracked pids.
    pub fn snapshot(&self) -> HashSet<u32> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u32>> {
        // A poisoned mutex only means another thread panicked mid-update;
        // the set itself is still consistent after any single operation.
        self.pids.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TrackingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide registry shared by every launch request, created on first
/// use and alive until process exit.
pub fn shared() -> Arc<TrackingRegistry> {
    static SHARED: OnceLock<Arc<TrackingRegistry>> = OnceLock::new();
    Arc::clone(SHARED.get_or_init(|| Arc::new(TrackingRegistry::new())))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
