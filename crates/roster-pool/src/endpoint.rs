use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::Notify;

use crate::error::PoolError;
use crate::pooler::{Pooler, Socket};

/// Connection pool for a single host.
///
/// Tracks how many connections are checked out (`active`) and keeps released
/// connections in an idle deque, newest at the front. Acquire prefers the
/// most recently used idle connection to keep warm connections hot; eviction
/// and stale sweeps work from the back, oldest first.
///
/// Callers at the per-host cap wait on [`acquire`](EndpointPool::acquire)
/// until a release frees a slot or the pool closes.
pub struct EndpointPool<P: Pooler> {
    pooler: Arc<P>,
    host: String,
    inner: Mutex<Inner<P::Socket>>,
    waiters: Notify,
}

struct Inner<S> {
    active: usize,
    idle: VecDeque<IdleEntry<S>>,
    closed: bool,
}

struct IdleEntry<S> {
    socket: S,
    attachment: Option<Box<dyn Any + Send>>,
    last_used: Instant,
}

impl<P: Pooler> EndpointPool<P> {
    /// Creates a pool for `host` governed by the given policy.
    pub fn new(pooler: Arc<P>, host: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            pooler,
            host: host.into(),
            inner: Mutex::new(Inner {
                active: 0,
                idle: VecDeque::new(),
                closed: false,
            }),
            waiters: Notify::new(),
        })
    }

    /// The host this pool connects to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Number of connections currently checked out to callers.
    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().active
    }

    /// Number of idle connections waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.inner.lock().unwrap().idle.len()
    }

    /// Whether the pool has been closed. Connections still checked out are
    /// closed as they are released.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Returns an idle connection or opens a new one.
    ///
    /// When the host is at `max_active_per_host`, waits until a release
    /// frees a slot or the pool closes. Fails with [`PoolError::Closed`] on
    /// a closed pool and surfaces socket factory errors verbatim.
    pub async fn acquire(self: &Arc<Self>) -> Result<Conn<P>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        if let Some(timeout) = self.pooler.idle_timeout() {
            if let Some(cutoff) = Instant::now().checked_sub(timeout) {
                self.sweep_idle(cutoff).await;
            }
        }

        loop {
            // The Notified future must be created while the lock is still
            // held: a release between unlock and wait would otherwise be
            // missed and this caller could sleep through a free slot.
            let wait = {
                let mut inner = self.inner.lock().unwrap();

                if let Some(entry) = inner.idle.pop_front() {
                    inner.active += 1;
                    if !inner.idle.is_empty() {
                        // The wait-variable holds at most one pending wakeup,
                        // so pass it along while sockets remain for other
                        // waiters. Spurious wakeups just re-check and park.
                        self.waiters.notify_one();
                    }
                    return Ok(Conn {
                        pool: self.clone(),
                        socket: Some(entry.socket),
                        attachment: entry.attachment,
                    });
                }

                if inner.closed {
                    return Err(PoolError::Closed);
                }

                let max = self.pooler.max_active_per_host();
                if max == 0 || inner.active < max {
                    inner.active += 1;
                    None
                } else {
                    Some(self.waiters.notified())
                }
            };

            match wait {
                Some(notified) => notified.await,
                None => {
                    return match self.pooler.open(&self.host).await {
                        Ok(socket) => Ok(Conn {
                            pool: self.clone(),
                            socket: Some(socket),
                            attachment: None,
                        }),
                        Err(err) => {
                            self.inner.lock().unwrap().active -= 1;
                            Err(PoolError::Open(err))
                        }
                    };
                }
            }
        }
    }

    /// Closes the pool: empties the idle deque, wakes every waiter, and
    /// closes the captured idle sockets with no lock held. Idempotent.
    pub async fn close(&self) {
        let idle = {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return;
            }
            inner.closed = true;
            std::mem::take(&mut inner.idle)
        };

        self.waiters.notify_waiters();

        for mut entry in idle {
            if let Err(err) = entry.socket.close().await {
                tracing::debug!(host = %self.host, error = %err, "failed to close idle socket on pool close");
            }
        }
    }

    /// Closes idle entries last used at or before `cutoff`, oldest first,
    /// stopping at the first fresh entry. Close failures are best-effort.
    async fn sweep_idle(&self, cutoff: Instant) -> usize {
        let mut swept = 0;
        loop {
            // Pop one stale entry at a time so the socket is closed with the
            // lock released.
            let entry = {
                let mut inner = self.inner.lock().unwrap();
                match inner.idle.back() {
                    Some(entry) if entry.last_used <= cutoff => inner.idle.pop_back(),
                    _ => None,
                }
            };
            let Some(mut entry) = entry else { break };
            if let Err(err) = entry.socket.close().await {
                tracing::debug!(host = %self.host, error = %err, "failed to close stale idle socket");
            }
            swept += 1;
        }
        swept
    }

    /// Returns a checked-out socket to the idle deque, or closes it when the
    /// pool is closed or the idle cap would be exceeded.
    async fn return_socket(
        &self,
        socket: P::Socket,
        attachment: Option<Box<dyn Any + Send>>,
    ) -> io::Result<()> {
        let to_close = {
            let mut inner = self.inner.lock().unwrap();
            inner.active -= 1;

            if inner.closed {
                Some(socket)
            } else {
                inner.idle.push_front(IdleEntry {
                    socket,
                    attachment,
                    last_used: Instant::now(),
                });

                let max_idle = self.pooler.max_idle_per_host();
                if max_idle > 0 && inner.idle.len() > max_idle {
                    inner.idle.pop_back().map(|entry| entry.socket)
                } else {
                    self.waiters.notify_one();
                    None
                }
            }
        };

        match to_close {
            Some(mut socket) => socket.close().await,
            None => Ok(()),
        }
    }

    /// Removes a checked-out socket from the active count without returning
    /// it to the pool. Waiters are not signalled: the freed slot is observed
    /// the next time one of them re-checks the cap.
    fn remove(&self) {
        self.inner.lock().unwrap().active -= 1;
    }
}

/// A connection checked out of an [`EndpointPool`].
///
/// Dereferences to the underlying socket. Call [`release`](Conn::release) to
/// return it for reuse or [`discard`](Conn::discard) when it is no longer
/// usable; a `Conn` that is simply dropped counts as discarded and the
/// socket is closed by its own `Drop`.
pub struct Conn<P: Pooler> {
    pool: Arc<EndpointPool<P>>,
    socket: Option<P::Socket>,
    attachment: Option<Box<dyn Any + Send>>,
}

impl<P: Pooler> Conn<P> {
    /// The host this connection is bound to.
    pub fn host(&self) -> &str {
        self.pool.host()
    }

    /// Caller-attached payload carried with the connection across reuses.
    pub fn attachment(&self) -> Option<&(dyn Any + Send)> {
        self.attachment.as_deref()
    }

    /// Takes the attached payload, leaving the slot empty.
    pub fn take_attachment(&mut self) -> Option<Box<dyn Any + Send>> {
        self.attachment.take()
    }

    /// Stores a payload on the connection. It is kept with the socket in
    /// the idle deque and handed back on the next acquire.
    pub fn set_attachment(&mut self, attachment: Option<Box<dyn Any + Send>>) {
        self.attachment = attachment;
    }

    /// Returns the connection to the pool for reuse.
    ///
    /// If the pool was closed while this connection was checked out, the
    /// socket is closed instead and the close result is returned.
    pub async fn release(mut self) -> io::Result<()> {
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };
        let attachment = self.attachment.take();
        self.pool.return_socket(socket, attachment).await
    }

    /// Closes the connection without returning it to the pool. Use this when
    /// the socket is broken; the next acquire opens a fresh one in its place.
    pub async fn discard(mut self) -> io::Result<()> {
        let Some(mut socket) = self.socket.take() else {
            return Ok(());
        };
        self.attachment = None;
        self.pool.remove();
        socket.close().await
    }
}

impl<P: Pooler> Deref for Conn<P> {
    type Target = P::Socket;

    fn deref(&self) -> &P::Socket {
        self.socket.as_ref().expect("socket present until release")
    }
}

impl<P: Pooler> DerefMut for Conn<P> {
    fn deref_mut(&mut self) -> &mut P::Socket {
        self.socket.as_mut().expect("socket present until release")
    }
}

impl<P: Pooler> Drop for Conn<P> {
    fn drop(&mut self) {
        // Neither released nor discarded: dropping the socket closes the
        // underlying transport, so only the bookkeeping is left to fix.
        if self.socket.is_some() {
            self.pool.remove();
        }
    }
}
