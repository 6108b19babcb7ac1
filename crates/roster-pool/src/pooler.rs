use std::io;
use std::time::Duration;

use async_trait::async_trait;

/// A closable connection handle held by the pool.
///
/// Dropping a socket releases its resources the usual Rust way; `close` is
/// the explicit, fallible shutdown used when the pool retires a connection
/// and the caller may care about the outcome.
#[async_trait]
pub trait Socket: Send + 'static {
    async fn close(&mut self) -> io::Result<()>;
}

/// Policy supplied by the owner of a pool set.
///
/// Defines how sockets are opened and the sizing knobs shared by every
/// per-host pool in the set.
#[async_trait]
pub trait Pooler: Send + Sync + 'static {
    type Socket: Socket;

    /// Opens a new connection to the host. Called with no pool lock held;
    /// it may block on the network and is expected to enforce its own
    /// connect timeout.
    async fn open(&self, host: &str) -> io::Result<Self::Socket>;

    /// How long a connection may sit idle before it is swept on the next
    /// acquire. `None` disables sweeping.
    fn idle_timeout(&self) -> Option<Duration>;

    /// Cap on connections checked out or idle per host. `0` means unbounded.
    fn max_active_per_host(&self) -> usize;

    /// Cap on idle connections kept per host. `0` means unbounded.
    fn max_idle_per_host(&self) -> usize;
}
