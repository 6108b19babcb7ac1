use std::collections::HashMap;

/// A consistent-hash ring of virtual nodes.
///
/// Each host contributes `replicas` virtual nodes whose positions are the
/// hash of the host string with the replica index appended. A key belongs to
/// the first virtual node at or after its own hash position, wrapping at the
/// top of the ring. Because positions only appear or disappear with their
/// host, adding or removing one host out of `N` remaps roughly `1/N` of the
/// key-space and leaves every other assignment untouched.
pub struct HashRing {
    replicas: usize,
    hash: fn(&[u8]) -> u32,
    positions: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring with the given replica factor and hash.
    pub fn new(replicas: usize, hash: fn(&[u8]) -> u32) -> Self {
        Self {
            replicas,
            hash,
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Inserts virtual nodes for each host and re-sorts the ring.
    pub fn add(&mut self, hosts: &[String]) {
        for host in hosts {
            for index in 0..self.replicas {
                let position = (self.hash)(format!("{host}{index}").as_bytes());
                self.positions.push(position);
                self.owners.insert(position, host.clone());
            }
        }
        self.positions.sort_unstable();
    }

    /// The host owning `key`, or `None` on an empty ring.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let position = (self.hash)(key.as_bytes());
        let mut index = self.positions.partition_point(|&p| p < position);
        if index == self.positions.len() {
            index = 0;
        }
        self.owners.get(&self.positions[index]).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmh3;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn ring_of(names: &[&str]) -> HashRing {
        let mut ring = HashRing::new(150, mmh3::sum32);
        ring.add(&hosts(names));
        ring
    }

    #[test]
    fn test_empty_ring_owns_nothing() {
        let ring = HashRing::new(150, mmh3::sum32);
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
    }

    #[test]
    fn test_single_host_owns_everything() {
        let ring = ring_of(&["only:1"]);
        for i in 0..50 {
            assert_eq!(ring.get(&format!("key-{i}")), Some("only:1"));
        }
    }

    #[test]
    fn test_assignment_is_stable() {
        let a = ring_of(&["h1:1", "h2:1", "h3:1"]);
        let b = ring_of(&["h3:1", "h1:1", "h2:1"]);
        for i in 0..100 {
            let key = format!("key-{i}");
            assert_eq!(a.get(&key), b.get(&key), "insertion order must not matter");
        }
    }

    #[test]
    fn test_every_host_owns_some_keys() {
        let ring = ring_of(&["h1:1", "h2:1", "h3:1"]);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..300 {
            *counts.entry(ring.get(&format!("key-{i}")).unwrap()).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 3, "150 replicas should spread keys over all hosts");
        for (_, count) in counts {
            assert!(count > 0);
        }
    }

    #[test]
    fn test_removing_a_host_only_remaps_its_keys() {
        let before = ring_of(&["h1:1", "h2:1", "h3:1", "h4:1"]);
        let after = ring_of(&["h1:1", "h2:1", "h3:1"]);

        for i in 0..200 {
            let key = format!("key-{i}");
            let owner = before.get(&key).unwrap();
            if owner != "h4:1" {
                assert_eq!(after.get(&key), Some(owner), "surviving assignments must not move");
            }
        }
    }
}
