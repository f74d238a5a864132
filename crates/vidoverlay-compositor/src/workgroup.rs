//! Wait group tracking in-flight render tasks.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counts outstanding tasks and lets callers block until none remain.
#[derive(Debug, Default)]
pub struct WorkGroup {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl WorkGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a task. The task counts until the guard is dropped.
    pub fn enter(self: &Arc<Self>) -> WorkGuard {
        *self.pending.lock() += 1;
        WorkGuard {
            group: Arc::clone(self),
        }
    }

    /// Tasks currently registered.
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Block until no task is registered.
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.drained.wait(&mut pending);
        }
    }

    /// Like [`WorkGroup::wait`], giving up after `timeout`. Returns whether
    /// the group drained.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while *pending > 0 {
            if self.drained.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }

    fn leave(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// Registration of one task in a [`WorkGroup`].
#[derive(Debug)]
pub struct WorkGuard {
    group: Arc<WorkGroup>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.group.leave();
    }
}
