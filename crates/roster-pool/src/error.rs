use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool set has no live endpoints to hand out connections for.
    #[error("no endpoints configured or available")]
    NoEndpoints,

    /// Acquire on a pool whose host left the membership or whose owning set
    /// was closed. Retryable: the membership may already contain a
    /// replacement pool.
    #[error("endpoint pool closed")]
    Closed,

    /// The socket factory failed to open a connection. The underlying error
    /// is surfaced verbatim.
    #[error("opening socket: {0}")]
    Open(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
