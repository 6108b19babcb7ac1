//! In-memory pooler stub shared by the pool and set tests.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::pooler::{Pooler, Socket};

pub(crate) struct TestSocket {
    pub id: usize,
    pub host: String,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Socket for TestSocket {
    async fn close(&mut self) -> io::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct TestPooler {
    max_active: usize,
    max_idle: usize,
    idle_timeout: Option<Duration>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    failing: AtomicBool,
}

impl TestPooler {
    pub(crate) fn new(max_active: usize, max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            max_active,
            max_idle,
            idle_timeout: None,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            failing: AtomicBool::new(false),
        })
    }

    pub(crate) fn with_idle_timeout(
        max_active: usize,
        max_idle: usize,
        idle_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            max_active,
            max_idle,
            idle_timeout: Some(idle_timeout),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            failing: AtomicBool::new(false),
        })
    }

    /// Makes every subsequent open fail with `ConnectionRefused`.
    pub(crate) fn fail_opens(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pooler for TestPooler {
    type Socket = TestSocket;

    async fn open(&self, host: &str) -> io::Result<TestSocket> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("refusing connection to {host}"),
            ));
        }
        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(TestSocket {
            id,
            host: host.to_string(),
            closed: self.closed.clone(),
        })
    }

    fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    fn max_active_per_host(&self) -> usize {
        self.max_active
    }

    fn max_idle_per_host(&self) -> usize {
        self.max_idle
    }
}
