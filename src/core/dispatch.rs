//! # Dispatch bridge: stream message → host.
//!
//! Each binding carries a [`Subscription`]. Delivery depends on its mode:
//!
//! ```text
//! Swap:     trigger(before-message) ── cancelled ──► stop
//!                  │
//!                  ▼
//!           transform(payload) ──► swap(target) ── failed ──► warn + SwapFailed
//!                  │
//!                  ▼
//!           trigger(message)
//!
//! Forward:  trigger(<spec trigger>) ──► trigger(message)
//! ```

use tracing::{debug, warn};

use crate::events::{Bus, Event, EventKind};
use crate::host::{ElementId, EventDetail, Host, names, page};
use crate::transport::StreamMessage;

/// How a bound stream event reaches the element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Swap the payload into the element's target.
    Swap,
    /// Re-dispatch as the page event named `trigger`.
    Forward {
        /// Full trigger name, prefix included (e.g. `sse:update`).
        trigger: String,
    },
}

/// One (stream event, mode) pair bound on an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Stream event name.
    pub event: String,
    /// Delivery mode.
    pub mode: SubscriptionMode,
}

impl Subscription {
    /// Swap-mode subscription.
    pub fn swap(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            mode: SubscriptionMode::Swap,
        }
    }

    /// Forward-mode subscription re-dispatched as `trigger`.
    pub fn forward(event: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            mode: SubscriptionMode::Forward {
                trigger: trigger.into(),
            },
        }
    }
}

/// Resolves `el`'s subscriptions: swap names first, then prefixed triggers.
///
/// Swap names are comma-separated and trimmed; empty entries are skipped.
pub(crate) fn resolve_subscriptions(host: &Host, el: ElementId, prefix: &str) -> Vec<Subscription> {
    let mut subs: Vec<Subscription> = host
        .attr(el, names::SWAP)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(Subscription::swap)
                .collect()
        })
        .unwrap_or_default();

    for spec in host.document.trigger_specs(el) {
        if let Some(event) = spec.trigger.strip_prefix(prefix) {
            if !event.is_empty() {
                subs.push(Subscription::forward(event, spec.trigger.as_str()));
            }
        }
    }
    subs
}

/// Routes delivered messages to the host's dispatch and swap services.
pub(crate) struct DispatchBridge {
    host: Host,
    bus: Bus,
}

impl DispatchBridge {
    pub(crate) fn new(host: Host, bus: Bus) -> Self {
        Self { host, bus }
    }

    pub(crate) fn deliver(&self, root: ElementId, el: ElementId, sub: &Subscription, msg: &StreamMessage) {
        let dispatch = &self.host.dispatch;
        let detail = EventDetail::Message(msg);

        match &sub.mode {
            SubscriptionMode::Swap => {
                if !dispatch.trigger(el, page::BEFORE_MESSAGE, detail) {
                    debug!(element = el.0, event = %sub.event, "message cancelled");
                    self.bus.publish(
                        Event::new(EventKind::MessageCancelled)
                            .with_root(root)
                            .with_element(el)
                            .with_event_name(sub.event.as_str()),
                    );
                    return;
                }
                let payload = self.host.swap.transform(el, msg.data.clone());
                if let Err(err) = self.host.swap.swap(el, &payload) {
                    warn!(element = el.0, event = %sub.event, error = %err, "swap failed");
                    self.bus.publish(
                        Event::new(EventKind::SwapFailed)
                            .with_root(root)
                            .with_element(el)
                            .with_event_name(sub.event.as_str())
                            .with_reason(err.reason),
                    );
                    return;
                }
                dispatch.trigger(el, page::MESSAGE, detail);
            }
            SubscriptionMode::Forward { trigger } => {
                dispatch.trigger(el, trigger, detail);
                dispatch.trigger(el, page::MESSAGE, detail);
            }
        }

        self.bus.publish(
            Event::new(EventKind::MessageDelivered)
                .with_root(root)
                .with_element(el)
                .with_event_name(sub.event.as_str()),
        );
    }
}
