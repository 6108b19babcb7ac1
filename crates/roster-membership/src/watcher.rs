use crate::event::EventReceiver;

/// A source of endpoint lists that notifies on change.
///
/// Implementations wrap a discovery mechanism (or a fixed list) and are
/// consumed by the pooling and selection layers, which hold them behind
/// `Arc<dyn Watcher>` so multiple implementations can coexist.
pub trait Watcher: Send + Sync {
    /// A snapshot of the current `host:port` endpoints. The returned vector
    /// is owned by the caller and never aliases internal storage.
    fn endpoints(&self) -> Vec<String>;

    /// Subscribes to change notifications.
    ///
    /// Notifications are coalescing: any number of changes may be observed
    /// as a single wakeup. After each wakeup the observer must re-read
    /// [`endpoints`](Watcher::endpoints); the wakeup itself carries no data.
    /// One final notification is delivered when the watcher closes, after
    /// which the channel reports closed.
    fn event(&self) -> EventReceiver;

    /// Whether this watcher has been closed. Downstream components stop
    /// draining events once this reports true.
    fn is_closed(&self) -> bool;
}
