use thiserror::Error;

/// Error type carried by response bodies and wrapped transport failures.
pub type BodyError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    /// The endpoint list is empty; there is nowhere to send the request.
    #[error("no servers configured or available")]
    NoServers,

    /// The request URL could not be parsed or rewritten.
    #[error("rewriting request url: {0}")]
    Url(#[from] http::Error),

    /// The underlying transport failed to perform the request.
    #[error("request failed: {0}")]
    Request(#[source] BodyError),
}

pub type Result<T> = std::result::Result<T, HttpError>;
