//! Per-host connection pooling with least-active selection.
//!
//! This crate is the core of the toolkit: a dynamic set of per-host
//! connection pools that multiplex concurrent callers over scarce sockets.
//!
//! # Architecture
//!
//! - **[`Pooler`]**: the policy seam. The owner of a set supplies the socket
//!   factory and the sizing knobs (per-host caps, idle timeout).
//! - **[`EndpointPool`]**: one host's pool. Checked-out connections are
//!   counted in `active`; released ones wait in an idle deque, newest first.
//!   Callers at the per-host cap park on the pool's wait-variable and are
//!   woken one at a time by releases, or all at once when the pool closes.
//! - **[`PoolSet`]**: the roster of pools. Reconciles itself against a host
//!   list and routes each acquire to the live pool with the fewest active
//!   connections.
//! - **[`Conn`]**: a checked-out connection. Dereferences to the socket and
//!   carries an attachment slot so higher layers can cache per-connection
//!   protocol state across reuses.
//!
//! # Locking
//!
//! Each pool has one mutex; the set has one lock over the roster. Neither is
//! ever held across a socket open or close, and pool locks never nest with
//! the set lock.

pub mod endpoint;
pub mod error;
pub mod pooler;
pub mod set;

#[cfg(test)]
pub(crate) mod testing;

pub use endpoint::{Conn, EndpointPool};
pub use error::{PoolError, Result};
pub use pooler::{Pooler, Socket};
pub use set::PoolSet;
