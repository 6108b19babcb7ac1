use roster_pool::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The watcher currently reports no endpoints, or every pool is closed.
    #[error("no endpoints configured or available")]
    NoEndpoints,

    /// The chosen per-host pool closed between selection and acquire,
    /// usually because the host just left the membership.
    #[error("endpoint pool closed")]
    ClosedPool,

    /// Acquire on a socket set that has been closed.
    #[error("socket set closed")]
    ClosedSet,

    /// The connector failed to open a socket.
    #[error("opening socket: {0}")]
    Open(#[source] std::io::Error),
}

impl ClientError {
    /// Whether the operation is worth retrying. Only [`ClosedPool`] is: the
    /// membership likely already contains a replacement for the departed
    /// host, so the next acquire selects a live pool.
    ///
    /// [`ClosedPool`]: ClientError::ClosedPool
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::ClosedPool)
    }
}

impl From<PoolError> for ClientError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NoEndpoints => ClientError::NoEndpoints,
            PoolError::Closed => ClientError::ClosedPool,
            PoolError::Open(err) => ClientError::Open(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
