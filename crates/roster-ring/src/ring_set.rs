use std::sync::{Arc, RwLock};
use std::time::Instant;

use roster_membership::{EventReceiver, EventSource, Watcher};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::mmh3;
use crate::ring::HashRing;

/// Virtual nodes per host. High enough that a handful of hosts still split
/// the key-space evenly.
pub const DEFAULT_REPLICAS: usize = 150;

#[derive(Debug, Error)]
pub enum RingError {
    /// The ring is empty; no host can own a key.
    #[error("no servers configured or available")]
    NoServers,
}

/// Consistent-hash host selection over a live member list.
///
/// Keys map deterministically onto the current members, and the mapping
/// shifts as little as possible when the membership changes: only keys owned
/// by a departed host move, roughly `1/N` of the key-space per host. The
/// member list tracks a [`Watcher`] when one is given and can always be set
/// manually.
pub struct RingSet {
    shared: Arc<Shared>,
    // Exits on its own when the watcher closes.
    _watcher_task: Option<JoinHandle<()>>,
}

struct Shared {
    replicas: usize,
    state: RwLock<State>,
    events: EventSource,
}

struct State {
    endpoints: Vec<String>,
    ring: HashRing,
}

impl Shared {
    fn store(&self, endpoints: &[String]) {
        let mut sorted = endpoints.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut ring = HashRing::new(self.replicas, mmh3::sum32);
        ring.add(&sorted);

        tracing::info!(endpoints = ?sorted, "ring membership updated");
        *self.state.write().unwrap() = State {
            endpoints: sorted,
            ring,
        };
    }
}

impl RingSet {
    /// Creates a ring set with `replicas` virtual nodes per host
    /// ([`DEFAULT_REPLICAS`] is the usual choice). Pass `None` for the
    /// watcher to drive the member list manually.
    ///
    /// When a watcher is given, its current endpoints are adopted without
    /// firing an event and a background task follows subsequent changes
    /// until the watcher closes; constructing with a watcher therefore
    /// requires a tokio runtime.
    pub fn new(watcher: Option<Arc<dyn Watcher>>, replicas: usize) -> Self {
        let shared = Arc::new(Shared {
            replicas,
            state: RwLock::new(State {
                endpoints: Vec::new(),
                ring: HashRing::new(replicas, mmh3::sum32),
            }),
            events: EventSource::new(),
        });

        let watcher_task = watcher.map(|watcher| {
            shared.store(&watcher.endpoints());
            tokio::spawn(drain_watcher(watcher, shared.clone()))
        });

        Self {
            shared,
            _watcher_task: watcher_task,
        }
    }

    /// Replaces the member list, rebuilding the ring atomically, and
    /// notifies subscribers. The next watcher event overrides a manual list.
    pub fn set_endpoints(&self, endpoints: &[String]) {
        self.shared.store(endpoints);
        self.shared.events.trigger();
    }

    /// The host owning `key` under the current membership.
    pub fn pick_server(&self, key: &str) -> Result<String, RingError> {
        let state = self.shared.state.read().unwrap();
        state
            .ring
            .get(key)
            .map(str::to_string)
            .ok_or(RingError::NoServers)
    }

    /// Runs `f` over each current member, stopping at the first error.
    pub fn each<E>(&self, mut f: impl FnMut(&str) -> Result<(), E>) -> Result<(), E> {
        let endpoints = self.endpoints();
        for endpoint in &endpoints {
            f(endpoint)?;
        }
        Ok(())
    }

    /// The current members, sorted and deduplicated.
    pub fn endpoints(&self) -> Vec<String> {
        self.shared.state.read().unwrap().endpoints.clone()
    }

    /// Subscribes to membership-change notifications.
    pub fn event(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Number of membership changes applied.
    pub fn event_count(&self) -> u64 {
        self.shared.events.count()
    }

    /// When the membership last changed, if ever.
    pub fn last_event(&self) -> Option<Instant> {
        self.shared.events.last_triggered()
    }
}

async fn drain_watcher(watcher: Arc<dyn Watcher>, shared: Arc<Shared>) {
    let mut changes = watcher.event();
    loop {
        let watcher_gone = changes.changed().await.is_err();
        shared.store(&watcher.endpoints());
        shared.events.trigger();
        if watcher_gone || watcher.is_closed() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_membership::FixedSet;
    use std::time::Duration;
    use tokio::time::timeout;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn manual_set(names: &[&str]) -> RingSet {
        let set = RingSet::new(None, DEFAULT_REPLICAS);
        set.set_endpoints(&hosts(names));
        set
    }

    #[test]
    fn test_pick_on_empty_set_fails() {
        let set = RingSet::new(None, DEFAULT_REPLICAS);
        assert!(matches!(set.pick_server("fooo"), Err(RingError::NoServers)));
    }

    #[test]
    fn test_pick_is_deterministic() {
        let set = manual_set(&["l1:1", "l2:1", "l3:1", "l4:1"]);
        let first = set.pick_server("fooo").unwrap();
        for _ in 0..10 {
            assert_eq!(set.pick_server("fooo").unwrap(), first);
        }
    }

    #[test]
    fn test_pick_survives_shrink_when_owner_stays() {
        let before = manual_set(&["l1:1", "l2:1", "l3:1", "l4:1"]);
        let after = manual_set(&["l1:1", "l2:1", "l3:1"]);

        // Any key not owned by the departed host keeps its assignment.
        for key in ["fooo", "bar", "baz", "session-42", "user:1001"] {
            let owner = before.pick_server(key).unwrap();
            if owner != "l4:1" {
                assert_eq!(after.pick_server(key).unwrap(), owner);
            } else {
                assert_ne!(after.pick_server(key).unwrap(), "l4:1");
            }
        }
    }

    #[test]
    fn test_endpoints_are_sorted_and_deduped() {
        let set = manual_set(&["b:2", "a:1", "b:2", "c:3"]);
        assert_eq!(set.endpoints(), vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn test_each_visits_every_member_in_order() {
        let set = manual_set(&["b:2", "a:1", "c:3"]);

        let mut visited = Vec::new();
        let result: Result<(), ()> = set.each(|endpoint| {
            visited.push(endpoint.to_string());
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(visited, vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn test_each_short_circuits_on_error() {
        let set = manual_set(&["a:1", "b:2", "c:3"]);

        let mut visited = 0;
        let result = set.each(|_| {
            visited += 1;
            if visited == 2 {
                Err("boom")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_manual_set_endpoints_counts_events() {
        let set = RingSet::new(None, DEFAULT_REPLICAS);
        set.set_endpoints(&hosts(&["a:1"]));
        set.set_endpoints(&hosts(&["a:1", "b:2"]));
        assert_eq!(set.event_count(), 2);
        assert!(set.last_event().is_some());
    }

    #[tokio::test]
    async fn test_watcher_changes_rebuild_the_ring() {
        let watcher = Arc::new(FixedSet::new(&hosts(&["a:1"])));
        let set = RingSet::new(Some(watcher.clone() as Arc<dyn Watcher>), DEFAULT_REPLICAS);

        assert_eq!(set.endpoints(), vec!["a:1"]);
        assert_eq!(set.pick_server("anything").unwrap(), "a:1");
        // Seeding from the watcher does not count as a change.
        assert_eq!(set.event_count(), 0);

        let mut rx = set.event();
        watcher.set_endpoints(&hosts(&["b:2"]));
        timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("change should propagate")
            .unwrap();

        assert_eq!(set.endpoints(), vec!["b:2"]);
        assert_eq!(set.pick_server("anything").unwrap(), "b:2");
        assert_eq!(set.event_count(), 1);
    }
}
