use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::{BodyError, HttpError, Result};

/// Request type accepted by a [`Transport`].
pub type HttpRequest = Request<Full<Bytes>>;

/// Response type produced by a [`Transport`], with the body boxed so that
/// hyper-backed and test transports share one signature.
pub type HttpResponse = Response<BoxBody<Bytes, BodyError>>;

/// Something that can perform a single HTTP request.
///
/// The rotating transport rewrites the request URL and hands it to one of
/// these; the implementation owns connection management per host.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn round_trip(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// The default [`Transport`]: a hyper client with its own per-host
/// connection pooling and keep-alive handling.
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn round_trip(&self, req: HttpRequest) -> Result<HttpResponse> {
        let response: Response<Incoming> = self
            .client
            .request(req)
            .await
            .map_err(|err| HttpError::Request(Box::new(err)))?;
        Ok(response.map(|body| body.map_err(|err| -> BodyError { Box::new(err) }).boxed()))
    }
}
