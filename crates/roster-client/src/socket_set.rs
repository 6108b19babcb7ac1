use std::any::Any;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use roster_membership::{EventReceiver, EventSource, Watcher};
use roster_pool::{Conn, PoolSet, Pooler};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::connector::Connector;
use crate::error::{ClientError, Result};
use crate::stats::{SocketSetStats, StatsSnapshot};

/// Sizing and timeout knobs for a [`SocketSet`].
#[derive(Debug, Clone)]
pub struct SocketSetConfig {
    /// Cap on connections checked out or idle per host; `0` means unbounded.
    ///
    /// Default: 10
    pub max_active_per_host: usize,
    /// Cap on idle connections kept per host; `0` means unbounded. Keep this
    /// at or above `max_active_per_host`, otherwise freshly released sockets
    /// are evicted straight away.
    ///
    /// Default: 10
    pub max_idle_per_host: usize,
    /// Dial timeout handed to the connector.
    ///
    /// Default: 1 second
    pub connect_timeout: Duration,
    /// How long a connection may sit idle before the next acquire sweeps it.
    ///
    /// Default: 5 minutes
    pub idle_timeout: Option<Duration>,
}

impl Default for SocketSetConfig {
    fn default() -> Self {
        Self {
            max_active_per_host: 10,
            max_idle_per_host: 10,
            connect_timeout: Duration::from_secs(1),
            idle_timeout: Some(Duration::from_secs(5 * 60)),
        }
    }
}

/// The policy half of a socket set: owns the connector and the config and
/// implements [`Pooler`] for the underlying pool set.
struct Policy<C: Connector> {
    connector: C,
    config: SocketSetConfig,
    stats: Arc<SocketSetStats>,
}

#[async_trait]
impl<C: Connector> Pooler for Policy<C> {
    type Socket = C::Socket;

    async fn open(&self, host: &str) -> io::Result<C::Socket> {
        match self
            .connector
            .connect(host, self.config.connect_timeout)
            .await
        {
            Ok(socket) => {
                self.stats.incr_created();
                Ok(socket)
            }
            Err(err) => {
                self.stats.incr_create_errors();
                Err(err)
            }
        }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        self.config.idle_timeout
    }

    fn max_active_per_host(&self) -> usize {
        self.config.max_active_per_host
    }

    fn max_idle_per_host(&self) -> usize {
        self.config.max_idle_per_host
    }
}

/// A watcher-driven set of pooled sockets.
///
/// Owns a [`PoolSet`] keyed by the watcher's current endpoints and keeps the
/// two in sync from a background task: on every watcher event the endpoint
/// list is re-read, the pools are reconciled, and a coalescing downstream
/// event is emitted. Acquired sockets come back as [`PooledSocket`] handles
/// that must be released or discarded.
pub struct SocketSet<C: Connector> {
    pools: Arc<PoolSet<Policy<C>>>,
    stats: Arc<SocketSetStats>,
    events: Arc<EventSource>,
    done_tx: watch::Sender<bool>,
    closed: AtomicBool,
    watcher_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> SocketSet<C> {
    /// Creates a set with the default config, seeded from the watcher's
    /// current endpoints. No downstream event fires for the initial list.
    pub async fn new(watcher: Arc<dyn Watcher>, connector: C) -> Self {
        Self::with_config(watcher, connector, SocketSetConfig::default()).await
    }

    /// Creates a set with a custom config.
    pub async fn with_config(
        watcher: Arc<dyn Watcher>,
        connector: C,
        config: SocketSetConfig,
    ) -> Self {
        let stats = Arc::new(SocketSetStats::new());
        let policy = Arc::new(Policy {
            connector,
            config,
            stats: stats.clone(),
        });
        let pools = Arc::new(PoolSet::new(policy));

        let seed = watcher.endpoints();
        pools.set_endpoints(&seed).await;

        let events = Arc::new(EventSource::new());
        let (done_tx, done_rx) = watch::channel(false);
        let task = tokio::spawn(drain_watcher(
            watcher,
            pools.clone(),
            events.clone(),
            stats.clone(),
            done_rx,
        ));

        Self {
            pools,
            stats,
            events,
            done_tx,
            closed: AtomicBool::new(false),
            watcher_task: Mutex::new(Some(task)),
        }
    }

    /// Acquires a pooled socket from the host with the fewest connections in
    /// flight.
    ///
    /// Fails with [`ClientError::ClosedSet`] once the set is closed and with
    /// [`ClientError::ClosedPool`] when a membership change closes the
    /// chosen pool mid-acquire; the latter is retryable.
    pub async fn acquire(&self) -> Result<PooledSocket<C>> {
        if self.is_closed() {
            return Err(ClientError::ClosedSet);
        }

        self.stats.incr_requested();
        let mut conn = self.pools.acquire().await?;
        let attachment = conn.take_attachment();
        Ok(PooledSocket {
            conn,
            attachment,
            stats: self.stats.clone(),
        })
    }

    /// Closes every pool and waits for the watcher-draining task to exit.
    /// Idempotent. Sockets still checked out are closed as they come back.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.done_tx.send_replace(true);
        self.pools.close().await;
        self.events.close();

        let task = self.watcher_task.lock().unwrap().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::debug!(error = %err, "watcher task ended abnormally");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Subscribes to the downstream change channel. One wakeup may cover
    /// several membership changes.
    pub fn event(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Number of membership changes applied, counted individually even when
    /// the wakeups coalesced.
    pub fn event_count(&self) -> u64 {
        self.events.count()
    }

    /// When the set last applied a membership change, if ever.
    pub fn last_event(&self) -> Option<Instant> {
        self.events.last_triggered()
    }

    /// Point-in-time copy of the set's operational counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Hosts that currently have a pool.
    pub fn hosts(&self) -> Vec<String> {
        self.pools.hosts()
    }
}

/// Applies watcher events to the pool set until the watcher or the set
/// closes.
async fn drain_watcher<C: Connector>(
    watcher: Arc<dyn Watcher>,
    pools: Arc<PoolSet<Policy<C>>>,
    events: Arc<EventSource>,
    stats: Arc<SocketSetStats>,
    mut done: watch::Receiver<bool>,
) {
    let mut changes = watcher.event();
    loop {
        tokio::select! {
            _ = done.changed() => break,
            changed = changes.changed() => {
                let watcher_gone = changed.is_err();
                stats.incr_watch_events();

                let hosts = watcher.endpoints();
                let (added, removed) = pools.set_endpoints(&hosts).await;
                if added > 0 || removed > 0 {
                    tracing::debug!(added, removed, "socket set membership updated");
                }
                events.trigger();

                if watcher_gone || watcher.is_closed() {
                    break;
                }
            }
        }
    }
}

/// A socket checked out of a [`SocketSet`].
///
/// Dereferences to the connector's socket type. The `attachment` slot rides
/// along with the socket in the pool, so a framed-protocol client built on
/// top of the raw socket survives between checkouts; [`release`] persists it
/// back, [`discard`] throws socket and attachment away.
///
/// [`release`]: PooledSocket::release
/// [`discard`]: PooledSocket::discard
pub struct PooledSocket<C: Connector> {
    conn: Conn<Policy<C>>,
    /// Caller payload cached across reuses of this socket.
    pub attachment: Option<Box<dyn Any + Send>>,
    stats: Arc<SocketSetStats>,
}

impl<C: Connector> PooledSocket<C> {
    /// The host this socket is connected to.
    pub fn host(&self) -> &str {
        self.conn.host()
    }

    /// Returns the socket to the pool, persisting the attachment with it.
    pub async fn release(self) -> io::Result<()> {
        let PooledSocket {
            mut conn,
            attachment,
            stats,
        } = self;
        stats.incr_released();
        conn.set_attachment(attachment);
        conn.release().await
    }

    /// Closes the socket without returning it to the pool. Use when the
    /// connection is broken.
    pub async fn discard(self) -> io::Result<()> {
        let PooledSocket { conn, stats, .. } = self;
        stats.incr_discarded();
        conn.discard().await
    }
}

impl<C: Connector> Deref for PooledSocket<C> {
    type Target = C::Socket;

    fn deref(&self) -> &C::Socket {
        &self.conn
    }
}

impl<C: Connector> DerefMut for PooledSocket<C> {
    fn deref_mut(&mut self) -> &mut C::Socket {
        &mut self.conn
    }
}
