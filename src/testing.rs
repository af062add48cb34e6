//! In-memory host and transport used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SwapError;
use crate::host::{Dispatch, Document, ElementId, EventDetail, Host, Liveness, Swap};
use crate::transport::{ConnectionHandle, Feed, Transport};
use crate::{Config, Manager};

struct Node {
    parent: Option<ElementId>,
    attrs: HashMap<String, String>,
    children: Vec<ElementId>,
    live: bool,
}

/// Tree of elements with attributes and a live flag.
#[derive(Default)]
pub(crate) struct FakeDocument {
    nodes: Mutex<HashMap<ElementId, Node>>,
    next: Mutex<u64>,
}

impl FakeDocument {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a live element under `parent`.
    pub(crate) fn add(&self, parent: Option<ElementId>, attrs: &[(&str, &str)]) -> ElementId {
        let id = {
            let mut next = self.next.lock();
            *next += 1;
            ElementId(*next)
        };
        let mut nodes = self.nodes.lock();
        if let Some(p) = parent.and_then(|p| nodes.get_mut(&p)) {
            p.children.push(id);
        }
        nodes.insert(
            id,
            Node {
                parent,
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                children: Vec::new(),
                live: true,
            },
        );
        id
    }

    pub(crate) fn set_attr(&self, el: ElementId, name: &str, value: &str) {
        if let Some(node) = self.nodes.lock().get_mut(&el) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    /// Takes `el` and its subtree out of the live document.
    pub(crate) fn detach(&self, el: ElementId) {
        let mut nodes = self.nodes.lock();
        let mut stack = vec![el];
        while let Some(id) = stack.pop() {
            if let Some(node) = nodes.get_mut(&id) {
                node.live = false;
                stack.extend(node.children.iter().copied());
            }
        }
    }
}

impl Document for FakeDocument {
    fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
        self.nodes.lock().get(&el)?.attrs.get(name).cloned()
    }

    fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.nodes.lock().get(&el)?.parent
    }

    fn descendants(&self, el: ElementId) -> Vec<ElementId> {
        let nodes = self.nodes.lock();
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = nodes
            .get(&el)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

impl Liveness for FakeDocument {
    fn is_live(&self, el: ElementId) -> bool {
        self.nodes.lock().get(&el).is_some_and(|n| n.live)
    }
}

/// A recorded page event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Fired {
    pub(crate) el: ElementId,
    pub(crate) name: String,
    pub(crate) data: Option<String>,
    pub(crate) error: bool,
}

/// Document plus recording dispatch and swap.
#[derive(Default)]
pub(crate) struct FakeHost {
    pub(crate) doc: FakeDocument,
    fired: Mutex<Vec<Fired>>,
    swaps: Mutex<Vec<(ElementId, String)>>,
    cancel: Mutex<HashSet<String>>,
    fail_swaps: Mutex<bool>,
    transform_prefix: Mutex<Option<String>>,
}

impl FakeHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every dispatch of `name` report cancellation.
    pub(crate) fn cancel(&self, name: &str) {
        self.cancel.lock().insert(name.to_string());
    }

    pub(crate) fn fail_swaps(&self) {
        *self.fail_swaps.lock() = true;
    }

    pub(crate) fn transform_with(&self, prefix: &str) {
        *self.transform_prefix.lock() = Some(prefix.to_string());
    }

    pub(crate) fn fired(&self) -> Vec<Fired> {
        self.fired.lock().clone()
    }

    /// Names of events fired on `el`, in order.
    pub(crate) fn fired_on(&self, el: ElementId) -> Vec<String> {
        self.fired
            .lock()
            .iter()
            .filter(|f| f.el == el)
            .map(|f| f.name.clone())
            .collect()
    }

    pub(crate) fn swaps(&self) -> Vec<(ElementId, String)> {
        self.swaps.lock().clone()
    }
}

impl Document for FakeHost {
    fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
        self.doc.attribute(el, name)
    }

    fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.doc.parent(el)
    }

    fn descendants(&self, el: ElementId) -> Vec<ElementId> {
        self.doc.descendants(el)
    }
}

impl Liveness for FakeHost {
    fn is_live(&self, el: ElementId) -> bool {
        self.doc.is_live(el)
    }
}

impl Dispatch for FakeHost {
    fn trigger(&self, el: ElementId, name: &str, detail: EventDetail<'_>) -> bool {
        let data = match detail {
            EventDetail::Message(msg) => Some(msg.data.clone()),
            _ => None,
        };
        self.fired.lock().push(Fired {
            el,
            name: name.to_string(),
            data,
            error: false,
        });
        !self.cancel.lock().contains(name)
    }

    fn trigger_error(&self, el: ElementId, name: &str, _detail: EventDetail<'_>) {
        self.fired.lock().push(Fired {
            el,
            name: name.to_string(),
            data: None,
            error: true,
        });
    }
}

impl Swap for FakeHost {
    fn transform(&self, _el: ElementId, payload: String) -> String {
        match self.transform_prefix.lock().as_deref() {
            Some(prefix) => format!("{prefix}{payload}"),
            None => payload,
        }
    }

    fn swap(&self, el: ElementId, payload: &str) -> Result<(), SwapError> {
        if *self.fail_swaps.lock() {
            return Err(SwapError::new("no swap target"));
        }
        self.swaps.lock().push((el, payload.to_string()));
        Ok(())
    }
}

/// Transport that records every feed it is asked to open.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    feeds: Mutex<Vec<Feed>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn opened(&self) -> usize {
        self.feeds.lock().len()
    }

    pub(crate) fn feed(&self, n: usize) -> Feed {
        self.feeds.lock()[n].clone()
    }

    pub(crate) fn last(&self) -> Feed {
        let feeds = self.feeds.lock();
        feeds[feeds.len() - 1].clone()
    }

    /// Handles that are not closed.
    pub(crate) fn live_handles(&self) -> Vec<ConnectionHandle> {
        self.feeds
            .lock()
            .iter()
            .filter(|f| !f.is_closed())
            .map(|f| f.handle().clone())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, feed: Feed) {
        self.feeds.lock().push(feed);
    }
}

/// Manager over a fresh fake host and scripted transport.
pub(crate) fn setup() -> (Arc<FakeHost>, Arc<ScriptedTransport>, Manager) {
    setup_with(Config::default())
}

pub(crate) fn setup_with(cfg: Config) -> (Arc<FakeHost>, Arc<ScriptedTransport>, Manager) {
    let host = FakeHost::new();
    let transport = ScriptedTransport::new();
    let manager = Manager::builder(Host::from_shared(host.clone()), transport.clone())
        .with_config(cfg)
        .build();
    (host, transport, manager)
}
