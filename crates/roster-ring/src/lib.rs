//! Consistent-hash host selection for cache-style backends.
//!
//! A [`RingSet`] maps keys onto the live members of a
//! [`Watcher`](roster_membership::Watcher)-driven endpoint list using a
//! consistent-hash ring, so that membership changes move as few keys as
//! possible. The ring is built over [MurmurHash3](mmh3::sum32) positions with
//! [`DEFAULT_REPLICAS`] virtual nodes per host.

pub mod mmh3;
pub mod ring;
pub mod ring_set;

pub use ring::HashRing;
pub use ring_set::{RingError, RingSet, DEFAULT_REPLICAS};
