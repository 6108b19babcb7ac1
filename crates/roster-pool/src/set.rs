use std::sync::{Arc, RwLock};

use rand::seq::SliceRandom;

use crate::endpoint::{Conn, EndpointPool};
use crate::error::PoolError;
use crate::pooler::Pooler;

/// A set of per-host [`EndpointPool`]s reconciled against a membership list.
///
/// The set itself holds no connections; it picks the least-loaded live pool
/// for each acquire and keeps the pool roster in sync with whatever host
/// list it is handed. Pools for departed hosts are closed, which wakes any
/// callers blocked on them.
pub struct PoolSet<P: Pooler> {
    pooler: Arc<P>,
    pools: RwLock<Vec<Arc<EndpointPool<P>>>>,
}

impl<P: Pooler> PoolSet<P> {
    /// Creates an empty set governed by the given policy. Seed it with
    /// [`set_endpoints`](Self::set_endpoints).
    pub fn new(pooler: Arc<P>) -> Self {
        Self {
            pooler,
            pools: RwLock::new(Vec::new()),
        }
    }

    /// Acquires a connection from the live pool with the fewest checked-out
    /// connections; ties go to the first such pool encountered.
    ///
    /// A concurrent membership update can close the chosen pool between
    /// selection and acquire; the resulting [`PoolError::Closed`] is
    /// surfaced so the caller can decide whether to retry.
    pub async fn acquire(&self) -> Result<Conn<P>, PoolError> {
        let chosen = {
            let pools = self.pools.read().unwrap();
            let mut min = usize::MAX;
            let mut chosen = None;
            for pool in pools.iter() {
                if pool.is_closed() {
                    continue;
                }
                let active = pool.active_count();
                if active < min {
                    min = active;
                    chosen = Some(pool.clone());
                }
            }
            chosen
        };

        match chosen {
            Some(pool) => pool.acquire().await,
            None => Err(PoolError::NoEndpoints),
        }
    }

    /// Reconciles the set against `hosts`: pools for departed hosts are
    /// removed and closed, new hosts get fresh pools. Returns how many pools
    /// were added and removed.
    ///
    /// The host list is shuffled before diffing so that a fleet of clients
    /// fed identical discovery output does not dial new hosts in the same
    /// order all at once.
    pub async fn set_endpoints(&self, hosts: &[String]) -> (usize, usize) {
        let mut hosts = hosts.to_vec();
        hosts.shuffle(&mut rand::thread_rng());

        let (added, removed) = {
            let mut pools = self.pools.write().unwrap();

            let (keep, removed): (Vec<_>, Vec<_>) = pools
                .drain(..)
                .partition(|pool| hosts.iter().any(|host| host == pool.host()));
            *pools = keep;

            let mut added = 0;
            for host in &hosts {
                if !pools.iter().any(|pool| pool.host() == host.as_str()) {
                    pools.push(EndpointPool::new(self.pooler.clone(), host.clone()));
                    added += 1;
                }
            }
            (added, removed)
        };

        // Closing can block on socket shutdown; do it with the set unlocked.
        let removed_count = removed.len();
        for pool in removed {
            pool.close().await;
        }

        (added, removed_count)
    }

    /// Closes every pool in the set. Idempotent; connections still checked
    /// out are closed as they are released.
    pub async fn close(&self) {
        let pools = self.pools.read().unwrap().clone();
        for pool in pools {
            pool.close().await;
        }
    }

    /// Hosts that currently have a pool, in set order.
    pub fn hosts(&self) -> Vec<String> {
        self.pools
            .read()
            .unwrap()
            .iter()
            .map(|pool| pool.host().to_string())
            .collect()
    }

    /// Number of pools in the set.
    pub fn len(&self) -> usize {
        self.pools.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestPooler;
    use std::time::Duration;
    use tokio::time::timeout;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn test_acquire_on_empty_set_fails() {
        let set = PoolSet::new(TestPooler::new(0, 0));
        assert!(matches!(set.acquire().await, Err(PoolError::NoEndpoints)));
    }

    #[tokio::test]
    async fn test_membership_diff_counts() {
        let set = PoolSet::new(TestPooler::new(0, 0));

        assert_eq!(set.set_endpoints(&hosts(&["e1"])).await, (1, 0));
        assert_eq!(set.set_endpoints(&hosts(&["e1", "e2"])).await, (1, 0));
        assert_eq!(set.set_endpoints(&hosts(&["e1", "e2", "e3"])).await, (1, 0));
        assert_eq!(set.set_endpoints(&hosts(&["e1"])).await, (0, 2));
        assert_eq!(set.set_endpoints(&hosts(&["e1", "e2"])).await, (1, 0));
        assert_eq!(set.set_endpoints(&hosts(&["e3"])).await, (1, 2));
        assert_eq!(set.hosts(), vec!["e3"]);
    }

    #[tokio::test]
    async fn test_duplicate_hosts_get_one_pool() {
        let set = PoolSet::new(TestPooler::new(0, 0));
        assert_eq!(set.set_endpoints(&hosts(&["e1", "e1", "e1"])).await, (1, 0));
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_input_list_is_copied() {
        let set = PoolSet::new(TestPooler::new(0, 0));
        let mut input = hosts(&["e1", "e2"]);
        set.set_endpoints(&input).await;

        input[0] = "e9".to_string();
        let mut current = set.hosts();
        current.sort();
        assert_eq!(current, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_acquire_prefers_least_active_pool() {
        let set = PoolSet::new(TestPooler::new(0, 0));
        set.set_endpoints(&hosts(&["e1", "e2"])).await;

        // Load one pool, then check the other is picked.
        let first = set.acquire().await.unwrap();
        let second = set.acquire().await.unwrap();
        assert_ne!(first.host(), second.host(), "second acquire should go to the empty pool");

        let third = set.acquire().await.unwrap();
        let fourth = set.acquire().await.unwrap();
        let mut picked = vec![first.host().to_string(), second.host().to_string(),
                              third.host().to_string(), fourth.host().to_string()];
        picked.sort();
        assert_eq!(picked.iter().filter(|h| *h == "e1").count(), 2);
        assert_eq!(picked.iter().filter(|h| *h == "e2").count(), 2);
    }

    #[tokio::test]
    async fn test_removed_host_is_not_selected() {
        let set = PoolSet::new(TestPooler::new(0, 0));
        set.set_endpoints(&hosts(&["e1", "e2"])).await;
        set.set_endpoints(&hosts(&["e2"])).await;

        for _ in 0..8 {
            let conn = set.acquire().await.unwrap();
            assert_eq!(conn.host(), "e2");
            conn.release().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_removing_host_wakes_its_waiters() {
        let pooler = TestPooler::new(1, 0);
        let set = Arc::new(PoolSet::new(pooler));
        set.set_endpoints(&hosts(&["e1"])).await;

        let held = set.acquire().await.unwrap();
        let waiter = {
            let set = set.clone();
            tokio::spawn(async move { set.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // e1 leaves the membership; the blocked acquire must not hang.
        set.set_endpoints(&hosts(&["e2"])).await;
        let result = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("membership change should wake the waiter")
            .unwrap();
        assert!(matches!(result, Err(PoolError::Closed)));

        // The held connection belongs to a closed pool now and is closed on
        // release rather than pooled.
        held.release().await.unwrap();
        let conn = set.acquire().await.unwrap();
        assert_eq!(conn.host(), "e2");
    }

    #[tokio::test]
    async fn test_close_closes_every_pool() {
        let set = PoolSet::new(TestPooler::new(0, 0));
        set.set_endpoints(&hosts(&["e1", "e2"])).await;

        set.close().await;
        set.close().await; // idempotent

        assert!(matches!(set.acquire().await, Err(PoolError::NoEndpoints)));
    }
}
