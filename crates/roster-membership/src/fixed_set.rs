use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use crate::event::{EventReceiver, EventSource};
use crate::watcher::Watcher;

/// A [`Watcher`] over a fixed, manually managed endpoint list.
///
/// Useful for tests and for deployments where the backend roster is static
/// or driven by something other than a discovery service. The stored list is
/// always a sorted copy of the input, so callers are free to reuse or mutate
/// the lists they pass in.
pub struct FixedSet {
    endpoints: RwLock<Vec<String>>,
    events: EventSource,
    closed: AtomicBool,
}

impl FixedSet {
    /// Creates a new set with the given endpoints. No change event is fired
    /// for the initial list.
    pub fn new(endpoints: &[String]) -> Self {
        let set = Self {
            endpoints: RwLock::new(Vec::new()),
            events: EventSource::new(),
            closed: AtomicBool::new(false),
        };
        set.store_endpoints(endpoints);
        set
    }

    /// Replaces the endpoint list and notifies subscribers.
    pub fn set_endpoints(&self, endpoints: &[String]) {
        self.store_endpoints(endpoints);
        self.events.trigger();
    }

    fn store_endpoints(&self, endpoints: &[String]) {
        let mut sorted = endpoints.to_vec();
        sorted.sort();
        *self.endpoints.write().unwrap() = sorted;
    }

    /// Marks the set closed and closes the event channel. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.events.close();
    }

    /// Number of times [`set_endpoints`](Self::set_endpoints) has fired an
    /// event, whether or not the wakeups coalesced on the observer side.
    pub fn event_count(&self) -> u64 {
        self.events.count()
    }

    /// When the set last fired a change event, if ever.
    pub fn last_event(&self) -> Option<Instant> {
        self.events.last_triggered()
    }
}

impl Watcher for FixedSet {
    fn endpoints(&self) -> Vec<String> {
        self.endpoints.read().unwrap().clone()
    }

    fn event(&self) -> EventReceiver {
        self.events.subscribe()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
