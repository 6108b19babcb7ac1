//! Round-robin HTTP requests over a dynamic endpoint roster.
//!
//! # Overview
//!
//! [`RotatingTransport`] sits in front of an HTTP client and spreads
//! requests across a set of interchangeable hosts. Each request's URL is
//! rewritten to the next endpoint in rotation and handed to the base
//! [`Transport`]; connection pooling stays where it belongs, in the HTTP
//! client underneath. The endpoint list tracks a
//! [`Watcher`](roster_membership::Watcher) or is set manually.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roster_http::RotatingTransport;
//! use roster_membership::{FixedSet, Watcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let watcher: Arc<dyn Watcher> = Arc::new(FixedSet::new(&[
//!         "api1.internal:8080".to_string(),
//!         "api2.internal:8080".to_string(),
//!     ]));
//!     let transport = RotatingTransport::new(Some(watcher), false);
//!
//!     // Alternates between api1 and api2.
//!     let response = transport.get("/healthz").await?;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod rotating;
pub mod transport;

pub use error::{BodyError, HttpError, Result};
pub use rotating::RotatingTransport;
pub use transport::{HttpRequest, HttpResponse, HyperTransport, Transport};
