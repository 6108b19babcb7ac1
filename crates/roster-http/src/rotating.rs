use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{Method, Request, Uri};
use http_body_util::Full;
use roster_membership::{EventReceiver, EventSource, Watcher};
use tokio::task::JoinHandle;

use crate::error::{HttpError, Result};
use crate::transport::{HttpRequest, HttpResponse, HyperTransport, Transport};

/// Round-robin host selector in front of an HTTP transport.
///
/// Does not own connections: it picks the next host from the current
/// endpoint list, rewrites the request URL to point at it, and delegates to
/// the base transport, which keeps its own per-host connection pools. The
/// endpoint list follows the watcher when one is given and can always be
/// overridden with [`set_endpoints`](RotatingTransport::set_endpoints).
pub struct RotatingTransport<T: Transport> {
    base: T,
    use_https: bool,
    counter: AtomicU64,
    shared: Arc<Shared>,
    // Exits on its own when the watcher closes.
    _watcher_task: Option<JoinHandle<()>>,
}

struct Shared {
    endpoints: RwLock<Vec<String>>,
    events: EventSource,
}

impl Shared {
    fn store(&self, endpoints: &[String]) {
        *self.endpoints.write().unwrap() = endpoints.to_vec();
    }
}

impl RotatingTransport<HyperTransport> {
    /// Creates a rotating transport over a default hyper client. Pass
    /// `None` for the watcher to drive the endpoint list manually.
    pub fn new(watcher: Option<Arc<dyn Watcher>>, use_https: bool) -> Self {
        Self::with_transport(watcher, HyperTransport::new(), use_https)
    }
}

impl<T: Transport> RotatingTransport<T> {
    /// Creates a rotating transport that delegates to `base`.
    ///
    /// When a watcher is given, the current endpoints are adopted without
    /// firing an event and a background task follows subsequent changes
    /// until the watcher closes; constructing with a watcher therefore
    /// requires a tokio runtime.
    pub fn with_transport(watcher: Option<Arc<dyn Watcher>>, base: T, use_https: bool) -> Self {
        let shared = Arc::new(Shared {
            endpoints: RwLock::new(Vec::new()),
            events: EventSource::new(),
        });

        let watcher_task = watcher.map(|watcher| {
            shared.store(&watcher.endpoints());
            tokio::spawn(drain_watcher(watcher, shared.clone()))
        });

        Self {
            base,
            use_https,
            counter: AtomicU64::new(0),
            shared,
            _watcher_task: watcher_task,
        }
    }

    /// Picks the next endpoint. The shared counter is bumped first, so the
    /// very first pick on a fresh transport is index `1 mod N`, not 0;
    /// callers observing two endpoints see rotation start at the second.
    pub fn rotate_endpoint(&self) -> Result<String> {
        let endpoints = self.shared.endpoints.read().unwrap();
        if endpoints.is_empty() {
            return Err(HttpError::NoServers);
        }
        let count = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let index = (count % endpoints.len() as u64) as usize;
        Ok(endpoints[index].clone())
    }

    /// Rewrites the request to the next endpoint and dispatches it.
    ///
    /// The chosen host replaces the URL's authority wholesale, so a port in
    /// the endpoint wins over a port in the original URL. A missing scheme
    /// becomes `https` when this transport was configured for TLS, `http`
    /// otherwise. Path and query are preserved verbatim.
    pub async fn round_trip(&self, mut req: HttpRequest) -> Result<HttpResponse> {
        let host = self.rotate_endpoint()?;
        let uri = rewrite_uri(req.uri(), &host, self.use_https)?;
        *req.uri_mut() = uri;
        self.base.round_trip(req).await
    }

    /// Issues a GET to `url`, with the host rewritten like any other
    /// round trip.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let req = Request::get(url)
            .body(Full::new(Bytes::new()))
            .map_err(HttpError::from)?;
        self.round_trip(req).await
    }

    /// Issues a request with the given method and body to `url`.
    pub async fn request(&self, method: Method, url: &str, body: Bytes) -> Result<HttpResponse> {
        let req = Request::builder()
            .method(method)
            .uri(url)
            .body(Full::new(body))
            .map_err(HttpError::from)?;
        self.round_trip(req).await
    }

    /// Replaces the endpoint list and notifies subscribers. The next watcher
    /// event overrides a manual list.
    pub fn set_endpoints(&self, endpoints: &[String]) {
        self.shared.store(endpoints);
        self.shared.events.trigger();
    }

    /// The current endpoint list.
    pub fn endpoints(&self) -> Vec<String> {
        self.shared.endpoints.read().unwrap().clone()
    }

    /// Subscribes to endpoint-change notifications.
    pub fn event(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Number of endpoint changes applied.
    pub fn event_count(&self) -> u64 {
        self.shared.events.count()
    }

    /// When the endpoint list last changed, if ever.
    pub fn last_event(&self) -> Option<Instant> {
        self.shared.events.last_triggered()
    }
}

#[async_trait]
impl<T: Transport> Transport for RotatingTransport<T> {
    async fn round_trip(&self, req: HttpRequest) -> Result<HttpResponse> {
        RotatingTransport::round_trip(self, req).await
    }
}

async fn drain_watcher(watcher: Arc<dyn Watcher>, shared: Arc<Shared>) {
    let mut changes = watcher.event();
    loop {
        let watcher_gone = changes.changed().await.is_err();
        shared.store(&watcher.endpoints());
        shared.events.trigger();
        if watcher_gone || watcher.is_closed() {
            break;
        }
    }
}

fn rewrite_uri(uri: &Uri, host: &str, use_https: bool) -> Result<Uri> {
    let authority: Authority = host.parse().map_err(http::Error::from)?;

    let mut parts = uri.clone().into_parts();
    parts.authority = Some(authority);
    if parts.scheme.is_none() {
        parts.scheme = Some(if use_https { Scheme::HTTPS } else { Scheme::HTTP });
    }
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }

    Uri::from_parts(parts)
        .map_err(http::Error::from)
        .map_err(HttpError::from)
}
