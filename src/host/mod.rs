//! # Host services consumed by the manager.
//!
//! The manager never touches a document directly. Everything it needs from the
//! page runtime is injected as four traits, bundled in [`Host`]:
//!
//! | Trait        | Provides                                                          |
//! |--------------|-------------------------------------------------------------------|
//! | [`Document`] | attribute lookup, tree navigation, trigger-spec parsing           |
//! | [`Liveness`] | "is this element still part of the live document"                 |
//! | [`Dispatch`] | page event dispatch (plain and error events)                      |
//! | [`Swap`]     | response transform pipeline and content swap into the target      |
//!
//! Elements are identified by an opaque [`ElementId`] issued by the host.

mod attrs;
mod trigger;

use std::sync::Arc;

pub use attrs::{attribute_value, names};
pub use trigger::{TriggerSpec, parse_trigger_specs};

use crate::error::{SwapError, TransportError};
use crate::transport::{ConnectionHandle, StreamMessage};

/// Page event names the manager dispatches through [`Dispatch`].
pub mod page {
    /// Cancelable; fired before a swap-mode message is swapped in.
    pub const BEFORE_MESSAGE: &str = "htmx:sseBeforeMessage";
    /// Fired after a swap, and after every forwarded trigger.
    pub const MESSAGE: &str = "htmx:sseMessage";
    /// Fired on the root when its connection opens.
    pub const OPEN: &str = "htmx:sseOpen";
    /// Fired on the root (as an error event) when its connection fails.
    pub const ERROR: &str = "htmx:sseError";
}

/// Opaque element identity issued by the host runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// Host lifecycle notifications routed through
/// [`Manager::on_host_event`](crate::Manager::on_host_event).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    /// The host finished processing `el` (`htmx:afterProcessNode`).
    AfterProcessNode(ElementId),
    /// The host is about to clean `el` up (`htmx:beforeCleanupElement`).
    BeforeCleanupElement(ElementId),
}

/// Attribute lookup and tree navigation.
pub trait Document: Send + Sync + 'static {
    /// Raw attribute value, exactly as declared on the element.
    fn attribute(&self, el: ElementId, name: &str) -> Option<String>;

    /// Parent element, `None` at the top of the tree.
    fn parent(&self, el: ElementId) -> Option<ElementId>;

    /// All descendants of `el` in document order, excluding `el` itself.
    fn descendants(&self, el: ElementId) -> Vec<ElementId>;

    /// Parsed trigger specifications of `el`.
    ///
    /// The default parses the `hx-trigger` attribute with [`parse_trigger_specs`].
    fn trigger_specs(&self, el: ElementId) -> Vec<TriggerSpec> {
        attribute_value(self, el, names::TRIGGER)
            .map(|raw| parse_trigger_specs(&raw))
            .unwrap_or_default()
    }
}

/// Document membership check.
pub trait Liveness: Send + Sync + 'static {
    /// Returns true iff `el` is currently part of the live document tree.
    fn is_live(&self, el: ElementId) -> bool;
}

/// Payload carried by a page event.
#[derive(Debug, Clone, Copy)]
pub enum EventDetail<'a> {
    /// A stream message (before-message, message, forwarded triggers).
    Message(&'a StreamMessage),
    /// The connection opened.
    Open {
        /// The handle that opened.
        source: &'a ConnectionHandle,
    },
    /// The connection reported an error.
    Error {
        /// What went wrong.
        error: &'a TransportError,
        /// The handle that failed.
        source: &'a ConnectionHandle,
    },
}

/// Page event dispatch.
pub trait Dispatch: Send + Sync + 'static {
    /// Dispatches `name` on `el`. Returns `false` if a listener cancelled it.
    fn trigger(&self, el: ElementId, name: &str, detail: EventDetail<'_>) -> bool;

    /// Dispatches an error event. Defaults to a plain [`Dispatch::trigger`].
    fn trigger_error(&self, el: ElementId, name: &str, detail: EventDetail<'_>) {
        let _ = self.trigger(el, name, detail);
    }
}

/// Response transform pipeline and content swap.
pub trait Swap: Send + Sync + 'static {
    /// Runs `payload` through the element's registered response transforms.
    ///
    /// The default is the identity.
    fn transform(&self, el: ElementId, payload: String) -> String {
        let _ = el;
        payload
    }

    /// Resolves the swap target and strategy for `el` and swaps `payload` in.
    fn swap(&self, el: ElementId, payload: &str) -> Result<(), SwapError>;
}

/// Bundle of injected host services.
#[derive(Clone)]
pub struct Host {
    /// Attribute lookup and navigation.
    pub document: Arc<dyn Document>,
    /// Document membership.
    pub liveness: Arc<dyn Liveness>,
    /// Page event dispatch.
    pub dispatch: Arc<dyn Dispatch>,
    /// Transform and swap.
    pub swap: Arc<dyn Swap>,
}

impl Host {
    /// Bundles the four services.
    pub fn new(
        document: Arc<dyn Document>,
        liveness: Arc<dyn Liveness>,
        dispatch: Arc<dyn Dispatch>,
        swap: Arc<dyn Swap>,
    ) -> Self {
        Self {
            document,
            liveness,
            dispatch,
            swap,
        }
    }

    /// Bundles a single value implementing all four services.
    pub fn from_shared<T>(host: Arc<T>) -> Self
    where
        T: Document + Liveness + Dispatch + Swap,
    {
        Self {
            document: host.clone(),
            liveness: host.clone(),
            dispatch: host.clone(),
            swap: host,
        }
    }

    /// Attribute lookup honoring the `data-` prefixed variant.
    pub(crate) fn attr(&self, el: ElementId, name: &str) -> Option<String> {
        attribute_value(self.document.as_ref(), el, name)
    }
}
