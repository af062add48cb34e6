//! # Runtime events emitted by the manager.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Connection events**: handle lifecycle per subscription root
//!   (opening, opened, failed, reconnect scheduled, closed, detached)
//! - **Binding events**: listener attachment and pruning per element
//! - **Delivery events**: what happened to an inbound stream message
//!
//! These are observability events for [`Observe`](crate::Observe)
//! implementations. They are distinct from the page events
//! (`htmx:sseOpen`, …) that go through the host's [`Dispatch`](crate::Dispatch).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{ElementId, Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReconnectScheduled)
//!     .with_root(ElementId(7))
//!     .with_url("/events")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(1000));
//!
//! assert_eq!(ev.kind, EventKind::ReconnectScheduled);
//! assert_eq!(ev.url.as_deref(), Some("/events"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::host::ElementId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Observer events ===
    /// Observer panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: `observer=<name>` plus panic info
    ObserverPanicked,

    /// Observer dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `observer=<name> reason=<full|closed>`
    ObserverOverflow,

    // === Connection events ===
    /// A fresh handle is being opened for a root.
    ///
    /// Sets: `root`, `url`, `attempt` (counter at open time)
    ConnectionOpening,

    /// The handle reported open.
    ///
    /// Sets: `root`, `url`, `attempt` (counter before reset)
    ConnectionOpened,

    /// The handle reported an error.
    ///
    /// Sets: `root`, `url`, `reason`
    ConnectionFailed,

    /// A reconnect was scheduled after a closed-state error.
    ///
    /// Sets: `root`, `url`, `attempt` (post-increment), `delay_ms`
    ReconnectScheduled,

    /// The handle was closed deliberately (close trigger, cleanup, URL change).
    ///
    /// Sets: `root`, `url`, `reason`
    ConnectionClosed,

    /// A root was found detached from the document; its handle is closed.
    ///
    /// Sets: `root`, `url`
    RootDetached,

    // === Binding events ===
    /// An element's binding set was (re)built.
    ///
    /// Sets: `root`, `element`, `event_name` (comma-joined event names)
    BindingsAttached,

    /// A binding removed itself because its element left the document.
    ///
    /// Sets: `root`, `element`, `event_name`
    BindingPruned,

    // === Delivery events ===
    /// A stream message was swapped or forwarded.
    ///
    /// Sets: `root`, `element`, `event_name`
    MessageDelivered,

    /// The cancelable before-message event was cancelled by the page.
    ///
    /// Sets: `root`, `element`, `event_name`
    MessageCancelled,

    /// The host swap pipeline rejected a message.
    ///
    /// Sets: `root`, `element`, `event_name`, `reason`
    SwapFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Subscription root the event concerns.
    pub root: Option<ElementId>,
    /// Subscriber element the event concerns.
    pub element: Option<ElementId>,
    /// Endpoint URL of the root.
    pub url: Option<Arc<str>>,
    /// Stream event name.
    pub event_name: Option<Arc<str>>,
    /// Attempt counter.
    pub attempt: Option<u32>,
    /// Reconnect delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            root: None,
            element: None,
            url: None,
            event_name: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the subscription root.
    #[inline]
    pub fn with_root(mut self, root: ElementId) -> Self {
        self.root = Some(root);
        self
    }

    /// Attaches the subscriber element.
    #[inline]
    pub fn with_element(mut self, element: ElementId) -> Self {
        self.element = Some(element);
        self
    }

    /// Attaches the endpoint URL.
    #[inline]
    pub fn with_url(mut self, url: impl Into<Arc<str>>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attaches the stream event name.
    #[inline]
    pub fn with_event_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a reconnect delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates an observer overflow event.
    #[inline]
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::ObserverOverflow)
            .with_reason(format!("observer={observer} reason={reason}"))
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked).with_reason(format!("observer={observer} {info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ConnectionOpening);
        let b = Event::new(EventKind::ConnectionOpened);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::ReconnectScheduled).with_delay(Duration::MAX);
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_overflow_reason() {
        let ev = Event::observer_overflow("metrics", "full");
        assert_eq!(ev.kind, EventKind::ObserverOverflow);
        assert_eq!(ev.reason.as_deref(), Some("observer=metrics reason=full"));
    }
}
