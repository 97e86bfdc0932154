use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// A snapshot of dispatcher activity, see [`crate::Dispatcher::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Commands accepted by `send` since the dispatcher started
    pub commands_accepted: u64,
    /// Host workers spawned since the dispatcher started.
    /// A host which went idle and came back counts twice.
    pub workers_spawned: u64,
    /// Host workers currently running
    pub active_workers: usize,
    /// Requests handed to the transport
    pub requests: u64,
    /// Requests which failed in the transport
    pub failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    commands_accepted: AtomicU64,
    workers_spawned: AtomicU64,
    active_workers: AtomicUsize,
    requests: AtomicU64,
    failures: AtomicU64,
    /// Shutdown sequences run, at most one per dispatcher
    drains: AtomicU64,
}

impl Counters {
    pub(crate) fn record_accepted(&self) {
        self.commands_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a new worker and return its generation, unique per dispatcher
    pub(crate) fn record_spawn(&self) -> u64 {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
        self.workers_spawned.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_exit(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_request(&self, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn drains(&self) -> u64 {
        self.drains.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            commands_accepted: self.commands_accepted.load(Ordering::Relaxed),
            workers_spawned: self.workers_spawned.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
