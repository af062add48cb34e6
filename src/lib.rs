//! # streamvisor
//!
//! **Streamvisor** keeps declarative server-sent-event subscriptions alive.
//!
//! Elements of a host document declare an endpoint (`sse-connect`), the
//! stream events they swap in (`sse-swap`), the stream events they re-dispatch
//! as page events (`hx-trigger="sse:<name>"`) and an optional close event
//! (`sse-close`). The [`Manager`] opens one connection per root, routes every
//! message to the elements bound to it, reconnects with exponential backoff
//! and cleans up after elements that left the document.
//!
//! The document, the event dispatcher, the swap pipeline and the transport
//! are injected; the crate itself performs no rendering and no I/O unless the
//! `http` feature's [`HttpTransport`] is used.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  host runtime                          streamvisor
//! ┌──────────────────┐   process_node   ┌───────────────────────────────────────────┐
//! │ Document         │ ───────────────► │ Manager                                   │
//! │ Liveness         │ cleanup_element  │  - RootTable (one handle per root)        │
//! │ Dispatch         │ ◄─────────────── │  - Registry  (listeners per element)      │
//! │ Swap             │  page events,    │  - DispatchBridge (swap / forward)        │
//! └──────────────────┘  swaps           │  - Bus (runtime events)                   │
//!                                       └──────┬──────────────────────────┬─────────┘
//!                                              │ Feed                     │ Event
//!                                              ▼                          ▼
//!                                   ┌────────────────────┐      ┌──────────────────┐
//!                                   │ Transport          │      │ ObserverSet      │
//!                                   │ (HttpTransport, …) │      │ (per-observer    │
//!                                   └────────────────────┘      │  queues)         │
//!                                                               └──────────────────┘
//! ```
//!
//! ### Root lifecycle
//! ```text
//! process_node(root) ──► ConnectionHandle::new ──► Transport::open(feed)
//!
//! on open  ──► page event htmx:sseOpen
//!          ├─► attempt > 0: rebind root and every subscriber beneath it
//!          └─► attempt = 0
//!
//! on error ──► page error event htmx:sseError
//!          ├─► root left the document ──► detach (close once, drop bindings)
//!          └─► handle closed ──► attempt += 1
//!                                delay = backoff.next(attempt)   (500ms, 1s, … 64s)
//!                                sleep(delay) ──► root live? reconnect : detach
//!
//! close event ──► close, never reconnect
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Manager**       | Roots, bindings, reconnects, cleanup.                        | [`Manager`], [`ManagerBuilder`]             |
//! | **Host services** | Injected document, liveness, dispatch and swap.              | [`Host`], [`Document`], [`Dispatch`], [`Swap`] |
//! | **Transport**     | Connection primitive and its producer side.                  | [`Transport`], [`ConnectionHandle`], [`Feed`] |
//! | **Policies**      | Reconnect backoff and jitter.                                | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Observers**     | Hook into runtime events (logging, metrics, custom).         | [`Observe`], [`ObserverSet`]                |
//! | **Errors**        | Typed transport and swap errors.                             | [`TransportError`], [`SwapError`]           |
//! | **Configuration** | Centralized settings.                                        | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] observer.
//! - `http`: exports [`HttpTransport`] (`reqwest` + `eventsource-stream`).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use streamvisor::{
//!     Dispatch, Document, ElementId, EventDetail, Feed, Host, Liveness, Manager,
//!     StreamMessage, Swap, SwapError, Transport,
//! };
//!
//! struct Page;
//!
//! impl Document for Page {
//!     fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
//!         match (el.0, name) {
//!             (1, "sse-connect") => Some("/events".into()),
//!             (2, "sse-swap") => Some("update".into()),
//!             _ => None,
//!         }
//!     }
//!     fn parent(&self, el: ElementId) -> Option<ElementId> {
//!         (el.0 == 2).then_some(ElementId(1))
//!     }
//!     fn descendants(&self, el: ElementId) -> Vec<ElementId> {
//!         if el.0 == 1 { vec![ElementId(2)] } else { Vec::new() }
//!     }
//! }
//! impl Liveness for Page {
//!     fn is_live(&self, _el: ElementId) -> bool { true }
//! }
//! impl Dispatch for Page {
//!     fn trigger(&self, _el: ElementId, _name: &str, _detail: EventDetail<'_>) -> bool { true }
//! }
//! impl Swap for Page {
//!     fn swap(&self, el: ElementId, payload: &str) -> Result<(), SwapError> {
//!         println!("swap into {el:?}: {payload}");
//!         Ok(())
//!     }
//! }
//!
//! /// Delivers one canned message as soon as the stream is opened.
//! struct Canned;
//!
//! impl Transport for Canned {
//!     fn open(&self, feed: Feed) {
//!         feed.opened();
//!         feed.message(StreamMessage::new("update", "<p>hello</p>"));
//!     }
//! }
//!
//! let manager = Manager::builder(Host::from_shared(Arc::new(Page)), Arc::new(Canned)).build();
//! manager.process_node(ElementId(2));
//! manager.process_node(ElementId(1));
//! assert_eq!(manager.bindings(ElementId(2)), Vec::<String>::new());
//! manager.process_node(ElementId(2));
//! assert_eq!(manager.bindings(ElementId(2)), vec!["update".to_string()]);
//! ```
mod config;
mod core;
mod error;
mod events;
mod host;
mod observers;
mod policies;
mod transport;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_TRIGGER_PREFIX};
pub use core::{Manager, ManagerBuilder, RootPhase, SELECTORS, Subscription, SubscriptionMode};
pub use error::{SwapError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use host::{
    Dispatch, Document, ElementId, EventDetail, Host, HostEvent, Liveness, Swap, TriggerSpec,
    attribute_value, names, page, parse_trigger_specs,
};
pub use observers::{Observe, ObserverSet};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use transport::{
    ConnectionHandle, Feed, Flow, ListenerId, ReadyState, StreamMessage, Transport,
};

// Optional: expose a simple built-in logger observer.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;

// Optional: expose the reqwest-backed transport.
// Enable with: `--features http`
#[cfg(feature = "http")]
pub use transport::HttpTransport;
