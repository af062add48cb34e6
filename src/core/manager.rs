//! # Manager: the public entry point.
//!
//! A [`Manager`] owns every subscription root discovered in one document and
//! wires the host services, the transport and the runtime event bus together.
//!
//! ## Architecture
//! ```text
//! host ── process_node(el) ──► supervisor::connect_root(el)   (el has sse-connect)
//!                         └──► registry::bind_element(el)     (el has sse-swap / sse: triggers)
//! host ── cleanup_element(el) ──► unbind el, close el's connection if it is a root
//!
//! Transport ── Feed ──► ConnectionHandle ──► on_open / on_error hooks ──► supervisor
//!                                       └──► listeners ──► alive probe ──► DispatchBridge
//!
//! every stage ── publish(Event) ──► Bus ──► observer listener ──► ObserverSet
//! ```
//!
//! ## Rules
//! - No lock is held while the host, a listener or the transport is called.
//! - Hooks and listeners hold a weak reference; dropping the last `Manager`
//!   closes every connection and cancels every pending reconnect.
//! - Reconnect timers need a Tokio runtime; everything else is synchronous.

use std::sync::{Arc, Weak};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::alive::LivenessChecker;
use super::builder::ManagerBuilder;
use super::dispatch::DispatchBridge;
use super::registry::Registry;
use super::supervisor::{RootPhase, RootTable};
use crate::config::Config;
use crate::events::{Bus, Event};
use crate::host::{ElementId, Host, HostEvent};
use crate::transport::{ConnectionHandle, Transport};

/// CSS selectors of elements the manager cares about.
pub const SELECTORS: [&str; 4] = [
    "[sse-connect]",
    "[data-sse-connect]",
    "[sse-swap]",
    "[data-sse-swap]",
];

pub(crate) struct Inner {
    pub(crate) cfg: Config,
    pub(crate) host: Host,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) bus: Bus,
    pub(crate) roots: RootTable,
    pub(crate) registry: Registry,
    pub(crate) alive: LivenessChecker,
    pub(crate) bridge: DispatchBridge,
    pub(crate) runtime_token: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        self.roots.close_all();
    }
}

/// Reconnecting stream subscription manager. Cheap to clone.
#[derive(Clone)]
pub struct Manager {
    pub(crate) inner: Arc<Inner>,
}

impl Manager {
    /// Starts building a manager over `host` and `transport`.
    pub fn builder(host: Host, transport: Arc<dyn Transport>) -> ManagerBuilder {
        ManagerBuilder::new(host, transport)
    }

    pub(crate) fn from_parts(
        cfg: Config,
        host: Host,
        transport: Arc<dyn Transport>,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Self {
        let alive = LivenessChecker::new(host.liveness.clone());
        let bridge = DispatchBridge::new(host.clone(), bus.clone());
        Self {
            inner: Arc::new(Inner {
                cfg,
                host,
                transport,
                bus,
                roots: RootTable::new(),
                registry: Registry::new(),
                alive,
                bridge,
                runtime_token,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Processes a newly inserted (or re-processed) element.
    ///
    /// Opens a connection if `el` declares an endpoint, then binds `el`'s own
    /// subscriptions to its nearest root. Elements with neither are ignored.
    pub fn process_node(&self, el: ElementId) {
        self.connect_root(el);
        self.bind_element(el);
    }

    /// Releases everything `el` holds before the host removes it.
    ///
    /// Unbinds `el`'s subscriptions; if `el` is a root, closes its connection
    /// and cancels any pending reconnect.
    pub fn cleanup_element(&self, el: ElementId) {
        self.unbind_element(el);
        self.release_root(el);
    }

    /// Routes a host lifecycle notification.
    pub fn on_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::AfterProcessNode(el) => self.process_node(el),
            HostEvent::BeforeCleanupElement(el) => self.cleanup_element(el),
        }
    }

    /// Selectors of elements the host should hand to [`Manager::process_node`].
    pub fn selectors() -> &'static [&'static str] {
        &SELECTORS
    }

    /// Subscribes to runtime events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    /// Current connection of `root`, if it is a known root.
    pub fn connection(&self, root: ElementId) -> Option<ConnectionHandle> {
        self.inner.roots.handle(root)
    }

    /// Consecutive failed attempts of `root` since its last successful open.
    pub fn attempt(&self, root: ElementId) -> Option<u32> {
        self.inner.roots.attempt(root)
    }

    /// Lifecycle phase of `root`.
    pub fn root_phase(&self, root: ElementId) -> Option<RootPhase> {
        self.inner.roots.phase(root)
    }

    /// Stream event names `el` is currently bound to, in binding order.
    pub fn bindings(&self, el: ElementId) -> Vec<String> {
        self.inner.registry.events(el)
    }

    /// Number of known subscription roots.
    pub fn root_count(&self) -> usize {
        self.inner.roots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::setup;

    #[test]
    fn test_selectors_cover_both_attribute_forms() {
        let s = Manager::selectors();
        assert!(s.contains(&"[sse-connect]"));
        assert!(s.contains(&"[data-sse-swap]"));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_plain_element_is_ignored() {
        let (host, transport, mgr) = setup();
        let el = host.doc.add(None, &[("class", "plain")]);

        mgr.process_node(el);

        assert_eq!(transport.opened(), 0);
        assert_eq!(mgr.root_count(), 0);
        assert!(mgr.bindings(el).is_empty());
    }

    #[test]
    fn test_host_events_route_to_process_and_cleanup() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);

        mgr.on_host_event(HostEvent::AfterProcessNode(root));
        assert_eq!(transport.opened(), 1);
        let handle = mgr.connection(root).expect("root connected");

        mgr.on_host_event(HostEvent::BeforeCleanupElement(root));
        assert!(handle.is_closed());
        assert_eq!(mgr.root_count(), 0);
    }

    #[test]
    fn test_drop_closes_connections() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        drop(mgr);
        assert!(transport.last().is_closed());
    }
}
