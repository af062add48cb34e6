//! HTTP transport over `reqwest` with `eventsource-stream` framing.
//!
//! One spawned task per [`Feed`]:
//! ```text
//! GET url (Accept: text/event-stream) ──► status / content-type check ──► feed.opened()
//!   └─► for each parsed event ──► feed.message()
//!   └─► error or end of body  ──► feed.error(err, Closed)
//! feed.closed() resolves at any point ──► task drops the response and exits
//! ```
//!
//! The transport never retries; the reconnect supervisor owns that decision.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, Url, header};
use tracing::{debug, info, warn};

use super::{Feed, ReadyState, StreamMessage, Transport};
use crate::error::TransportError;

/// `reqwest`-backed [`Transport`].
///
/// Credentialed requests go through a client with a cookie store; anonymous
/// ones through a client without.
#[derive(Clone)]
pub struct HttpTransport {
    credentialed: Client,
    anonymous: Client,
    base_url: Option<Url>,
}

impl HttpTransport {
    /// Builds a transport with default clients.
    pub fn new() -> Result<Self, TransportError> {
        let build = |cookies: bool| {
            Client::builder()
                .cookie_store(cookies)
                .build()
                .map_err(|e| TransportError::Connect {
                    reason: format!("failed to build HTTP client: {e}"),
                })
        };
        Ok(Self::with_clients(build(true)?, build(false)?))
    }

    /// Uses caller-provided clients.
    pub fn with_clients(credentialed: Client, anonymous: Client) -> Self {
        Self {
            credentialed,
            anonymous,
            base_url: None,
        }
    }

    /// Resolves relative endpoint URLs (e.g. `/events`) against `base`.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, TransportError> {
        let base = Url::parse(base).map_err(|e| TransportError::Connect {
            reason: format!("invalid base url {base:?}: {e}"),
        })?;
        self.base_url = Some(base);
        Ok(self)
    }

    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|e| TransportError::Connect {
            reason: format!("invalid url {url:?}: {e}"),
        })
    }
}

impl Transport for HttpTransport {
    fn open(&self, feed: Feed) {
        let url = match self.resolve(feed.url()) {
            Ok(url) => url,
            Err(err) => {
                feed.error(err, ReadyState::Closed);
                return;
            }
        };
        let client = if feed.with_credentials() {
            self.credentialed.clone()
        } else {
            self.anonymous.clone()
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(url = %url, "no async runtime; stream not opened");
            feed.error(
                TransportError::Connect {
                    reason: "no async runtime".into(),
                },
                ReadyState::Closed,
            );
            return;
        };

        runtime.spawn(async move {
            tokio::select! {
                _ = feed.closed() => {
                    debug!(url = %url, "stream closed by consumer");
                }
                res = stream_events(&client, url.clone(), &feed) => {
                    if let Err(err) = res {
                        warn!(url = %url, error = %err, "stream failed");
                        feed.error(err, ReadyState::Closed);
                    }
                }
            }
        });
    }
}

async fn stream_events(client: &Client, url: Url, feed: &Feed) -> Result<(), TransportError> {
    info!(url = %url, "stream connecting");
    let resp = client
        .get(url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| TransportError::Connect {
            reason: e.to_string(),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }
    if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
        let ct = ct.to_str().unwrap_or("");
        if !ct.contains("text/event-stream") {
            return Err(TransportError::ContentType {
                content_type: ct.to_string(),
            });
        }
    }

    feed.opened();

    let mut events = resp.bytes_stream().eventsource();
    while let Some(item) = events.next().await {
        let ev = item.map_err(|e| TransportError::Stream {
            reason: e.to_string(),
        })?;
        let event = if ev.event.is_empty() {
            "message".to_string()
        } else {
            ev.event
        };
        feed.message(StreamMessage {
            event,
            data: ev.data,
            last_event_id: ev.id,
        });
        if feed.is_closed() {
            return Ok(());
        }
    }
    Err(TransportError::Ended)
}
