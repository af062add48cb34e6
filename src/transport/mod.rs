//! Streaming transport: the connection primitive the manager drives.
//!
//! The manager creates a [`ConnectionHandle`], installs its hooks, and hands the
//! producer side ([`Feed`]) to a [`Transport`]. The transport performs the I/O
//! and reports `opened` / `message` / `error` through the feed until the
//! handle is closed.
//!
//! ## Contents
//! - [`ConnectionHandle`], [`Feed`], [`ReadyState`], [`StreamMessage`],
//!   [`ListenerId`], [`Flow`]
//! - [`Transport`] the injection point
//! - `HttpTransport` (feature `http`) a `reqwest` + `eventsource-stream` implementation

mod handle;
#[cfg(feature = "http")]
mod http;

pub use handle::{ConnectionHandle, Feed, Flow, ListenerId, ReadyState, StreamMessage};
#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Opens streaming connections.
///
/// `open` must return promptly: network I/O belongs on a spawned task that
/// drives the feed. Framing, `Last-Event-ID` handling and credentialing are
/// the transport's business.
pub trait Transport: Send + Sync + 'static {
    /// Starts streaming `feed.url()` into `feed`.
    fn open(&self, feed: Feed);
}
