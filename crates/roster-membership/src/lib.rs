//! Endpoint membership sources.
//!
//! A [`Watcher`] is anything that can report the current list of `host:port`
//! endpoints for a service and notify observers when that list changes:
//! a discovery client, a config reloader, or the in-memory [`FixedSet`]
//! provided here for tests and static deployments.
//!
//! Change notifications are *coalescing*: many updates may collapse into a
//! single wakeup, so observers must always re-read [`Watcher::endpoints`]
//! after waking. See [`EventSource`] for the notification primitive shared
//! by the downstream selector crates.

pub mod event;
pub mod fixed_set;
pub mod watcher;

pub use event::{EventReceiver, EventSource};
pub use fixed_set::FixedSet;
pub use watcher::Watcher;
