//! # LogWriter: runtime events as `tracing` records
//!
//! A minimal observer that renders incoming [`Event`]s through `tracing`.
//! Connection failures and swap failures are `warn`, everything else `info`
//! or `debug`. Install a `tracing` subscriber to see the output.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO streamvisor: [opening] root=3 url="/events" attempt=0
//! WARN streamvisor: [failed] root=3 url="/events" err="stream ended by server"
//! INFO streamvisor: [reconnect] root=3 url="/events" attempt=1 delay_ms=500
//! INFO streamvisor: [opened] root=3 url="/events"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::observers::Observe;

/// Event writer observer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let root = e.root.map(|r| r.0);
        let element = e.element.map(|r| r.0);
        let url = e.url.as_deref().unwrap_or("");
        let name = e.event_name.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ConnectionOpening => {
                info!(target: "streamvisor", ?root, url, attempt = ?e.attempt, "[opening]");
            }
            EventKind::ConnectionOpened => {
                info!(target: "streamvisor", ?root, url, "[opened]");
            }
            EventKind::ConnectionFailed => {
                warn!(target: "streamvisor", ?root, url, err = reason, "[failed]");
            }
            EventKind::ReconnectScheduled => {
                info!(
                    target: "streamvisor",
                    ?root, url, attempt = ?e.attempt, delay_ms = ?e.delay_ms,
                    "[reconnect]"
                );
            }
            EventKind::ConnectionClosed => {
                info!(target: "streamvisor", ?root, url, reason, "[closed]");
            }
            EventKind::RootDetached => {
                info!(target: "streamvisor", ?root, url, "[detached]");
            }
            EventKind::BindingsAttached => {
                debug!(target: "streamvisor", ?root, ?element, events = reason, "[bound]");
            }
            EventKind::BindingPruned => {
                debug!(target: "streamvisor", ?root, ?element, event = name, "[pruned]");
            }
            EventKind::MessageDelivered => {
                debug!(target: "streamvisor", ?element, event = name, "[delivered]");
            }
            EventKind::MessageCancelled => {
                debug!(target: "streamvisor", ?element, event = name, "[cancelled]");
            }
            EventKind::SwapFailed => {
                warn!(target: "streamvisor", ?element, event = name, err = reason, "[swap-failed]");
            }
            EventKind::ObserverOverflow => {
                warn!(target: "streamvisor", reason, "[observer-overflow]");
            }
            EventKind::ObserverPanicked => {
                warn!(target: "streamvisor", reason, "[observer-panicked]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
