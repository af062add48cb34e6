//! # Listener registry: which element listens to which stream events.
//!
//! Tracks, per subscriber element, the listeners it registered on its root's
//! connection, so they can be removed again on cleanup, rebinding or pruning.
//!
//! ```text
//! bind_element(el)
//!   ├─► unbind previous set of el
//!   ├─► resolve subscriptions (sse-swap names, sse: triggers)
//!   ├─► nearest root with a connection (el itself counts)   none ──► inert
//!   └─► one listener per subscription ──► BindingSet { root, handle, entries }
//!
//! listener(msg)
//!   ├─► root gone?     ──► detach root, Unsubscribe
//!   ├─► element gone?  ──► prune el, Unsubscribe
//!   └─► DispatchBridge::deliver
//! ```
//!
//! ## Rules
//! - An element has at most one binding set; rebinding replaces it.
//! - Rebinding after a reconnect never duplicates listeners.
//! - The registry lock is never held while touching a handle.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use super::dispatch::{Subscription, resolve_subscriptions};
use super::manager::Manager;
use crate::events::{Event, EventKind};
use crate::host::{ElementId, names};
use crate::transport::{ConnectionHandle, Flow, ListenerId, StreamMessage};

struct BindingSet {
    root: ElementId,
    handle: ConnectionHandle,
    entries: Vec<(String, ListenerId)>,
}

impl BindingSet {
    fn release(self) {
        for (event, id) in &self.entries {
            self.handle.remove_listener(event, *id);
        }
    }
}

/// Binding sets keyed by subscriber element.
pub(crate) struct Registry {
    sets: Mutex<HashMap<ElementId, BindingSet>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            sets: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, el: ElementId, set: BindingSet) {
        let previous = self.sets.lock().insert(el, set);
        if let Some(previous) = previous {
            previous.release();
        }
    }

    /// Removes `el`'s listeners. Returns false if it had none.
    pub(crate) fn remove(&self, el: ElementId) -> bool {
        let set = self.sets.lock().remove(&el);
        match set {
            Some(set) => {
                set.release();
                true
            }
            None => false,
        }
    }

    /// Removes every binding set hanging off `root`.
    pub(crate) fn drop_root(&self, root: ElementId) {
        let dropped: Vec<BindingSet> = {
            let mut sets = self.sets.lock();
            let elements: Vec<ElementId> = sets
                .iter()
                .filter(|(_, s)| s.root == root)
                .map(|(el, _)| *el)
                .collect();
            elements.iter().filter_map(|el| sets.remove(el)).collect()
        };
        for set in dropped {
            set.release();
        }
    }

    /// Elements currently bound to `root`.
    pub(crate) fn elements_of(&self, root: ElementId) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = self
            .sets
            .lock()
            .iter()
            .filter(|(_, s)| s.root == root)
            .map(|(el, _)| *el)
            .collect();
        out.sort();
        out
    }

    pub(crate) fn events(&self, el: ElementId) -> Vec<String> {
        self.sets
            .lock()
            .get(&el)
            .map(|s| s.entries.iter().map(|(e, _)| e.clone()).collect())
            .unwrap_or_default()
    }
}

impl Manager {
    /// Binds `el`'s subscriptions to its nearest root's connection,
    /// replacing whatever `el` was bound to before.
    pub(crate) fn bind_element(&self, el: ElementId) {
        let inner = &self.inner;
        inner.registry.remove(el);

        let subs = resolve_subscriptions(&inner.host, el, inner.cfg.trigger_prefix());
        if subs.is_empty() {
            return;
        }
        let Some((root, handle)) = self.nearest_root(el) else {
            debug!(element = el.0, "no subscription root; element left inert");
            return;
        };

        let entries: Vec<(String, ListenerId)> = subs
            .into_iter()
            .map(|sub| {
                let event = sub.event.clone();
                let id = handle.add_listener(&event, self.listener(root, el, sub));
                (event, id)
            })
            .collect();

        let joined = entries
            .iter()
            .map(|(e, _)| e.as_str())
            .collect::<Vec<_>>()
            .join(",");
        debug!(element = el.0, root = root.0, events = %joined, "bindings attached");
        inner.bus.publish(
            Event::new(EventKind::BindingsAttached)
                .with_root(root)
                .with_element(el)
                .with_event_name(joined),
        );
        inner.registry.insert(
            el,
            BindingSet {
                root,
                handle,
                entries,
            },
        );
    }

    pub(crate) fn unbind_element(&self, el: ElementId) {
        self.inner.registry.remove(el);
    }

    /// Rebinds `root` and every subscriber under it to the current connection.
    pub(crate) fn rebind_root(&self, root: ElementId) {
        let inner = &self.inner;
        let mut seen = HashSet::new();
        let mut targets = vec![root];
        targets.extend(
            inner
                .host
                .document
                .descendants(root)
                .into_iter()
                .filter(|el| self.is_subscriber(*el)),
        );
        targets.extend(inner.registry.elements_of(root));

        for el in targets {
            if seen.insert(el) {
                self.bind_element(el);
            }
        }
    }

    fn is_subscriber(&self, el: ElementId) -> bool {
        let host = &self.inner.host;
        host.attr(el, names::SWAP).is_some() || host.attr(el, names::TRIGGER).is_some()
    }

    fn nearest_root(&self, el: ElementId) -> Option<(ElementId, ConnectionHandle)> {
        let mut cursor = Some(el);
        while let Some(candidate) = cursor {
            if self.inner.roots.contains(candidate) {
                return self
                    .inner
                    .roots
                    .handle(candidate)
                    .map(|handle| (candidate, handle));
            }
            cursor = self.inner.host.document.parent(candidate);
        }
        None
    }

    fn listener(
        &self,
        root: ElementId,
        el: ElementId,
        sub: Subscription,
    ) -> impl Fn(&StreamMessage) -> Flow + Send + Sync + 'static {
        let weak = self.downgrade();
        move |msg| match Manager::upgrade(&weak) {
            Some(mgr) => mgr.on_message(root, el, &sub, msg),
            None => Flow::Unsubscribe,
        }
    }

    fn on_message(&self, root: ElementId, el: ElementId, sub: &Subscription, msg: &StreamMessage) -> Flow {
        if !self.probe_root(root) {
            return Flow::Unsubscribe;
        }
        if !self.inner.alive.is_live(el) {
            if self.inner.registry.remove(el) {
                debug!(element = el.0, root = root.0, "binding pruned");
                self.inner.bus.publish(
                    Event::new(EventKind::BindingPruned)
                        .with_root(root)
                        .with_element(el)
                        .with_event_name(sub.event.as_str()),
                );
            }
            return Flow::Unsubscribe;
        }
        self.inner.bridge.deliver(root, el, sub, msg);
        Flow::Continue
    }
}
