//! Pooled sockets over a dynamic endpoint roster.
//!
//! # Overview
//!
//! A [`SocketSet`] subscribes to a [`Watcher`](roster_membership::Watcher),
//! keeps one connection pool per live host, and hands out pooled sockets
//! from the least-loaded host. The transport is pluggable through the
//! [`Connector`] trait; [`TcpConnector`] covers the common raw-TCP case, and
//! RPC stacks implement their own to dial framed sockets instead.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roster_client::{SocketSet, TcpConnector};
//! use roster_membership::FixedSet;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let watcher = Arc::new(FixedSet::new(&["cache1:11211".to_string()]));
//!     let set = SocketSet::new(watcher, TcpConnector::new()).await;
//!
//!     let socket = set.acquire().await?;
//!     // ... speak your protocol over the socket ...
//!     socket.release().await?;
//!
//!     set.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Connection lifecycle
//!
//! Every acquired [`PooledSocket`] must be either released (back to the idle
//! pool, attachment preserved) or discarded (closed, e.g. after an I/O
//! error). Hosts that leave the membership have their pools closed; sockets
//! checked out from such a pool are closed on release instead of pooled.

pub mod connector;
pub mod error;
pub mod socket_set;
pub mod stats;

pub use connector::{Connector, TcpConnector, TcpSocket};
pub use error::{ClientError, Result};
pub use socket_set::{PooledSocket, SocketSet, SocketSetConfig};
pub use stats::{SocketSetStats, StatsSnapshot};
