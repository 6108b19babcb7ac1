use std::sync::atomic::{AtomicU64, Ordering};

/// Cheap operational counters for a socket set.
///
/// Updated with relaxed atomics on the hot paths; read them through
/// [`snapshot`](SocketSetStats::snapshot) and export them however the
/// application likes.
#[derive(Debug, Default)]
pub struct SocketSetStats {
    requested: AtomicU64,
    created: AtomicU64,
    create_errors: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
    watch_events: AtomicU64,
}

/// Point-in-time copy of a set's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections requested via acquire.
    pub requested: u64,
    /// Sockets actually dialed.
    pub created: u64,
    /// Dial attempts that failed.
    pub create_errors: u64,
    /// Connections returned to the pool.
    pub released: u64,
    /// Connections destroyed by the caller.
    pub discarded: u64,
    /// Membership change events drained from the watcher.
    pub watch_events: u64,
}

impl SocketSetStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr_requested(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_create_errors(&self) {
        self.create_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_watch_events(&self) {
        self.watch_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            create_errors: self.create_errors.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            watch_events: self.watch_events.load(Ordering::Relaxed),
        }
    }
}
