use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::watch;

/// Receive half of a change channel produced by an [`EventSource`].
pub type EventReceiver = watch::Receiver<()>;

/// A coalescing change-notification channel.
///
/// Semantically a capacity-one channel that drops when full: triggering while
/// a notification is already pending folds the two into one. Observers wake,
/// re-read whatever state the source guards, and go back to waiting. The
/// trigger count is tracked separately so tests and callers can tell exactly
/// how many changes occurred even when the wakeups coalesced.
pub struct EventSource {
    tx: Mutex<Option<watch::Sender<()>>>,
    rx: EventReceiver,
    count: AtomicU64,
    last: Mutex<Option<Instant>>,
}

impl EventSource {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(());
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            count: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    /// Subscribes to the channel. Receivers obtained after [`close`](Self::close)
    /// observe the channel as already closed.
    pub fn subscribe(&self) -> EventReceiver {
        self.rx.clone()
    }

    /// Records a change and notifies subscribers, unless the source is closed.
    pub fn trigger(&self) {
        let tx = self.tx.lock().unwrap();
        if let Some(tx) = tx.as_ref() {
            self.count.fetch_add(1, Ordering::Relaxed);
            *self.last.lock().unwrap() = Some(Instant::now());
            tx.send_replace(());
        }
    }

    /// Closes the channel. Subscribers see one final wakeup (the channel
    /// closing) and every later `changed` call reports closed. Idempotent.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    /// Number of times [`trigger`](Self::trigger) has fired.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// When the source last triggered, if ever.
    pub fn last_triggered(&self) -> Option<Instant> {
        *self.last.lock().unwrap()
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_subscriber() {
        let source = EventSource::new();
        let mut rx = source.subscribe();

        source.trigger();
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("subscriber should wake")
            .expect("channel should be open");
        assert_eq!(source.count(), 1);
        assert!(source.last_triggered().is_some());
    }

    #[tokio::test]
    async fn test_triggers_coalesce_but_count_exactly() {
        let source = EventSource::new();
        let mut rx = source.subscribe();

        for _ in 0..5 {
            source.trigger();
        }

        // All five triggers collapse into a single pending wakeup.
        rx.changed().await.unwrap();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(source.count(), 5);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_closes_channel() {
        let source = EventSource::new();
        let mut rx = source.subscribe();

        source.close();
        source.close();

        assert!(rx.changed().await.is_err());
        // Triggers after close are dropped, not counted.
        source.trigger();
        assert_eq!(source.count(), 0);
    }
}
