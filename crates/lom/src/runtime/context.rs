//! Context Tracking - Teardown Ordering for Child Execution Contexts
//!
//! Each child interpreter context running on its own OS thread registers
//! itself here. The thread that performed initial setup blocks until the
//! count of still-running contexts returns to zero before tearing down
//! shared infrastructure, so no child is mid-promotion or mid-decrement when
//! the runtime goes away.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Count of running child contexts, with a condition variable for waiters
pub struct ContextTracker {
    running: Mutex<usize>,
    idle: Condvar,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    /// Register a child context
    ///
    /// The returned guard deregisters on drop, so a context that panics
    /// still counts down and never wedges teardown.
    pub fn register(tracker: &Arc<ContextTracker>) -> ContextGuard {
        *tracker.running.lock() += 1;
        ContextGuard {
            tracker: Arc::clone(tracker),
        }
    }

    /// Number of contexts currently running
    pub fn running(&self) -> usize {
        *self.running.lock()
    }

    /// Block until every registered context has finished
    pub fn wait_idle(&self) {
        let mut running = self.running.lock();
        while *running > 0 {
            self.idle.wait(&mut running);
        }
    }

    /// Block until idle or until `timeout` elapses
    ///
    /// Returns `true` when the tracker went idle within the timeout.
    pub fn wait_idle_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut running = self.running.lock();

        while *running > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let outcome = self.idle.wait_for(&mut running, deadline - now);
            if outcome.timed_out() && *running > 0 {
                return false;
            }
        }

        true
    }
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII registration of one child context
pub struct ContextGuard {
    tracker: Arc<ContextTracker>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let mut running = self.tracker.running.lock();
        *running = running.saturating_sub(1);
        if *running == 0 {
            self.tracker.idle.notify_all();
        }
    }
}
