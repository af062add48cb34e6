//! # Reconnect supervisor: one connection per subscription root.
//!
//! Owns the per-root state table and drives the root lifecycle:
//!
//! ```text
//!            process_node(root)
//!                   │
//!                   ▼
//!   ┌──────────► Connecting ──── on_open ────► Open
//!   │               │                           │
//!   │          on_error(Closed)            on_error(Closed)
//!   │               │                           │
//!   │               ▼                           │
//!   │   Backoff (attempt += 1, timer) ◄─────────┘
//!   │               │
//!   └─ timer fires, root live
//!
//!   close trigger ──► Closed (no reconnect)
//!   root detached / cleanup ──► state removed
//! ```
//!
//! ## Rules
//! - At most one handle per root is not `Closed`.
//! - The attempt counter survives across handles and resets only on open.
//! - Notifications from a handle that is no longer the root's current one are
//!   ignored, apart from the page error event.
//! - A pending reconnect is cancelled whenever the root detaches, is cleaned
//!   up or re-processed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::manager::Manager;
use crate::error::TransportError;
use crate::events::{Event, EventKind};
use crate::host::{ElementId, EventDetail, names, page};
use crate::transport::{ConnectionHandle, Flow, ReadyState};

/// Lifecycle phase of a subscription root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootPhase {
    /// A handle was created and handed to the transport.
    Connecting,
    /// The current handle is open.
    Open,
    /// The handle closed; a reconnect timer is pending.
    Backoff,
    /// Closed by the close trigger, or no timer could be scheduled.
    Closed,
}

struct PendingRetry {
    generation: u64,
    token: CancellationToken,
}

struct RootState {
    url: Arc<str>,
    close_event: Option<String>,
    attempt: u32,
    phase: RootPhase,
    handle: Option<ConnectionHandle>,
    retry: Option<PendingRetry>,
    generation: u64,
}

impl RootState {
    fn new(url: Arc<str>) -> Self {
        Self {
            url,
            close_event: None,
            attempt: 0,
            phase: RootPhase::Connecting,
            handle: None,
            retry: None,
            generation: 0,
        }
    }

    fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.handle.as_ref().is_some_and(|h| h.same(handle))
    }

    fn cancel_retry(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.token.cancel();
        }
    }
}

/// Per-root state keyed by root element.
pub(crate) struct RootTable {
    roots: Mutex<HashMap<ElementId, RootState>>,
}

impl RootTable {
    pub(crate) fn new() -> Self {
        Self {
            roots: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn contains(&self, root: ElementId) -> bool {
        self.roots.lock().contains_key(&root)
    }

    pub(crate) fn len(&self) -> usize {
        self.roots.lock().len()
    }

    pub(crate) fn handle(&self, root: ElementId) -> Option<ConnectionHandle> {
        self.roots.lock().get(&root)?.handle.clone()
    }

    pub(crate) fn attempt(&self, root: ElementId) -> Option<u32> {
        self.roots.lock().get(&root).map(|s| s.attempt)
    }

    pub(crate) fn phase(&self, root: ElementId) -> Option<RootPhase> {
        self.roots.lock().get(&root).map(|s| s.phase)
    }

    /// Closes every handle and cancels every timer.
    pub(crate) fn close_all(&self) {
        let states: Vec<RootState> = self.roots.lock().drain().map(|(_, s)| s).collect();
        for mut st in states {
            st.cancel_retry();
            if let Some(h) = st.handle {
                h.close();
            }
        }
    }
}

impl Manager {
    /// Opens (or keeps) the connection of `root`.
    ///
    /// A live handle with an unchanged URL is reused. Otherwise any previous
    /// handle is closed and a new one is created and handed to the transport.
    pub(crate) fn connect_root(&self, root: ElementId) {
        let inner = &self.inner;
        let Some(url) = inner.host.attr(root, names::CONNECT) else {
            return;
        };
        let close_event = inner.host.attr(root, names::CLOSE);

        let (handle, stale, attempt) = {
            let mut roots = inner.roots.roots.lock();
            let st = roots
                .entry(root)
                .or_insert_with(|| RootState::new(Arc::from(url.as_str())));

            if let Some(h) = &st.handle {
                if !h.is_closed() && *st.url == *url {
                    debug!(root = root.0, url = %url, "connection reused");
                    return;
                }
            }
            st.cancel_retry();

            let handle = ConnectionHandle::new(url.as_str(), inner.cfg.with_credentials);
            self.install_hooks(root, &handle, close_event.as_deref());

            st.url = Arc::from(url.as_str());
            st.close_event = close_event;
            st.phase = RootPhase::Connecting;
            let stale = st.handle.replace(handle.clone());
            (handle, stale, st.attempt)
        };

        if let Some(old) = stale {
            if old.close() {
                inner.bus.publish(
                    Event::new(EventKind::ConnectionClosed)
                        .with_root(root)
                        .with_url(old.url())
                        .with_reason("replaced"),
                );
            }
            // subscribers still point at the old handle
            self.rebind_root(root);
        }

        info!(root = root.0, url = %url, attempt, "connection opening");
        inner.bus.publish(
            Event::new(EventKind::ConnectionOpening)
                .with_root(root)
                .with_url(url.as_str())
                .with_attempt(attempt),
        );
        inner.transport.open(handle.feed());
    }

    fn install_hooks(&self, root: ElementId, handle: &ConnectionHandle, close_event: Option<&str>) {
        let weak = self.downgrade();
        handle.on_open(move |h| {
            if let Some(mgr) = Manager::upgrade(&weak) {
                mgr.on_open(root, h);
            }
        });

        let weak = self.downgrade();
        handle.on_error(move |h, err| {
            if let Some(mgr) = Manager::upgrade(&weak) {
                mgr.on_error(root, h, err);
            }
        });

        if let Some(name) = close_event {
            let weak = self.downgrade();
            let id = handle.id();
            let event = name.to_string();
            handle.add_listener(name, move |_| {
                if let Some(mgr) = Manager::upgrade(&weak) {
                    mgr.close_by_trigger(root, id, &event);
                }
                Flow::Unsubscribe
            });
        }
    }

    fn on_open(&self, root: ElementId, handle: &ConnectionHandle) {
        let inner = &self.inner;
        let previous = {
            let mut roots = inner.roots.roots.lock();
            let Some(st) = roots.get_mut(&root) else {
                return;
            };
            if !st.is_current(handle) {
                return;
            }
            st.phase = RootPhase::Open;
            std::mem::take(&mut st.attempt)
        };

        info!(root = root.0, url = %handle.url(), "connection opened");
        inner
            .host
            .dispatch
            .trigger(root, page::OPEN, EventDetail::Open { source: handle });
        inner.bus.publish(
            Event::new(EventKind::ConnectionOpened)
                .with_root(root)
                .with_url(handle.url())
                .with_attempt(previous),
        );

        if previous > 0 {
            self.rebind_root(root);
        }
    }

    fn on_error(&self, root: ElementId, handle: &ConnectionHandle, err: &TransportError) {
        let inner = &self.inner;
        warn!(root = root.0, url = %handle.url(), error = %err, "connection error");
        inner.host.dispatch.trigger_error(
            root,
            page::ERROR,
            EventDetail::Error {
                error: err,
                source: handle,
            },
        );
        inner.bus.publish(
            Event::new(EventKind::ConnectionFailed)
                .with_root(root)
                .with_url(handle.url())
                .with_reason(err.as_message()),
        );

        let current = inner
            .roots
            .roots
            .lock()
            .get(&root)
            .is_some_and(|st| st.is_current(handle));
        if !current {
            return;
        }
        if !self.probe_root(root) {
            return;
        }
        if handle.state() == ReadyState::Closed {
            self.schedule_retry(root);
        }
    }

    fn schedule_retry(&self, root: ElementId) {
        let inner = &self.inner;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(root = root.0, "no async runtime; reconnect not scheduled");
            if let Some(st) = inner.roots.roots.lock().get_mut(&root) {
                st.phase = RootPhase::Closed;
            }
            return;
        };

        let (url, attempt, delay, generation, token) = {
            let mut roots = inner.roots.roots.lock();
            let Some(st) = roots.get_mut(&root) else {
                return;
            };
            st.cancel_retry();
            st.attempt = st.attempt.saturating_add(1);
            st.generation += 1;
            st.phase = RootPhase::Backoff;
            let token = inner.runtime_token.child_token();
            st.retry = Some(PendingRetry {
                generation: st.generation,
                token: token.clone(),
            });
            (
                st.url.clone(),
                st.attempt,
                inner.cfg.backoff.next(st.attempt),
                st.generation,
                token,
            )
        };

        info!(root = root.0, url = %url, attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        inner.bus.publish(
            Event::new(EventKind::ReconnectScheduled)
                .with_root(root)
                .with_url(url)
                .with_attempt(attempt)
                .with_delay(delay),
        );

        let weak = self.downgrade();
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(mgr) = Manager::upgrade(&weak) {
                        mgr.retry_fired(root, generation);
                    }
                }
            }
        });
    }

    fn retry_fired(&self, root: ElementId, generation: u64) {
        {
            let mut roots = self.inner.roots.roots.lock();
            let Some(st) = roots.get_mut(&root) else {
                return;
            };
            match &st.retry {
                Some(retry) if retry.generation == generation => st.retry = None,
                _ => return,
            }
        }
        if self.probe_root(root) {
            self.connect_root(root);
        }
    }

    fn close_by_trigger(&self, root: ElementId, handle_id: u64, event: &str) {
        let handle = {
            let mut roots = self.inner.roots.roots.lock();
            let Some(st) = roots.get_mut(&root) else {
                return;
            };
            if st.handle.as_ref().map(ConnectionHandle::id) != Some(handle_id) {
                return;
            }
            st.cancel_retry();
            st.phase = RootPhase::Closed;
            st.handle.clone()
        };
        let Some(handle) = handle else {
            return;
        };
        if handle.close() {
            info!(root = root.0, url = %handle.url(), event, "connection closed by stream event");
            self.inner.bus.publish(
                Event::new(EventKind::ConnectionClosed)
                    .with_root(root)
                    .with_url(handle.url())
                    .with_event_name(event)
                    .with_reason("close trigger"),
            );
        }
    }

    /// Forgets `root`: closes its handle once, cancels its timer, drops every
    /// binding that hangs off it. Returns false if `root` was not known.
    pub(crate) fn detach_root(&self, root: ElementId) -> bool {
        let Some(url) = self.forget_root(root) else {
            return false;
        };
        info!(root = root.0, url = %url, "root detached");
        self.inner.bus.publish(
            Event::new(EventKind::RootDetached)
                .with_root(root)
                .with_url(url),
        );
        true
    }

    /// Cleanup path for a root element; no-op for other elements.
    pub(crate) fn release_root(&self, root: ElementId) {
        if let Some(url) = self.forget_root(root) {
            debug!(root = root.0, url = %url, "root cleaned up");
        }
    }

    fn forget_root(&self, root: ElementId) -> Option<Arc<str>> {
        let mut st = self.inner.roots.roots.lock().remove(&root)?;
        st.cancel_retry();
        if let Some(handle) = st.handle.take() {
            if handle.close() {
                self.inner.bus.publish(
                    Event::new(EventKind::ConnectionClosed)
                        .with_root(root)
                        .with_url(handle.url()),
                );
            }
        }
        self.inner.registry.drop_root(root);
        Some(st.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::policies::BackoffPolicy;
    use crate::testing::{setup, setup_with};
    use crate::transport::StreamMessage;
    use std::time::Duration;

    fn sleep_ms(ms: u64) -> tokio::time::Sleep {
        tokio::time::sleep(Duration::from_millis(ms))
    }

    #[test]
    fn test_root_opens_one_connection() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);

        mgr.process_node(root);

        assert_eq!(transport.opened(), 1);
        let feed = transport.last();
        assert_eq!(feed.url(), "/events");
        assert!(feed.with_credentials());
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Connecting));
        assert_eq!(mgr.attempt(root), Some(0));
    }

    #[test]
    fn test_data_prefixed_endpoint() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("data-sse-connect", "/feed")]);
        mgr.process_node(root);
        assert_eq!(transport.last().url(), "/feed");
    }

    #[test]
    fn test_reprocess_same_url_reuses_handle() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);

        mgr.process_node(root);
        mgr.process_node(root);

        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.live_handles().len(), 1);
    }

    #[test]
    fn test_reprocess_changed_url_replaces_handle() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/a")]);
        mgr.process_node(root);

        host.doc.set_attr(root, "sse-connect", "/b");
        mgr.process_node(root);

        assert_eq!(transport.opened(), 2);
        assert!(transport.feed(0).is_closed());
        let live = transport.live_handles();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].url(), "/b");
    }

    #[test]
    fn test_changed_url_moves_subscribers_to_new_handle() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/a")]);
        let el = host.doc.add(Some(root), &[("sse-swap", "update")]);
        mgr.process_node(root);
        mgr.process_node(el);

        host.doc.set_attr(root, "sse-connect", "/b");
        mgr.process_node(root);

        let feed = transport.last();
        assert_eq!(feed.url(), "/b");
        assert_eq!(feed.handle().listener_count("update"), 1);

        feed.opened();
        feed.message(StreamMessage::new("update", "<div>b</div>"));
        assert_eq!(host.swaps(), vec![(el, "<div>b</div>".to_string())]);
        assert_eq!(mgr.bindings(el), vec!["update"]);
    }

    #[test]
    fn test_rediscovery_after_close_trigger_rebinds_subscribers() {
        let (host, transport, mgr) = setup();
        let root = host
            .doc
            .add(None, &[("sse-connect", "/events"), ("sse-close", "done")]);
        let el = host.doc.add(Some(root), &[("sse-swap", "update")]);
        mgr.process_node(root);
        mgr.process_node(el);
        transport.last().message(StreamMessage::new("done", ""));
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Closed));

        mgr.process_node(root);

        let feed = transport.last();
        assert_eq!(transport.opened(), 2);
        feed.opened();
        feed.message(StreamMessage::new("update", "again"));
        assert_eq!(host.swaps(), vec![(el, "again".to_string())]);
    }

    #[test]
    fn test_open_fires_page_event() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        transport.last().opened();

        assert_eq!(host.fired_on(root), vec![page::OPEN.to_string()]);
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Open));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_error_schedules_first_retry_after_500ms() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);

        let fired = host.fired();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].name, page::ERROR);
        assert!(fired[0].error);
        assert_eq!(mgr.attempt(root), Some(1));
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Backoff));

        sleep_ms(400).await;
        assert_eq!(transport.opened(), 1);

        sleep_ms(200).await;
        assert_eq!(transport.opened(), 2);
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Connecting));
        assert_eq!(transport.live_handles().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_until_open() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);
        let mut rx = mgr.events();

        for _ in 0..3 {
            transport
                .last()
                .error(TransportError::Ended, ReadyState::Closed);
            sleep_ms(10_000).await;
        }

        let mut delays = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ReconnectScheduled {
                delays.push(ev.delay_ms.unwrap_or_default());
            }
        }
        assert_eq!(delays, vec![500, 1000, 2000]);
        assert_eq!(mgr.attempt(root), Some(3));

        transport.last().opened();
        assert_eq!(mgr.attempt(root), Some(0));

        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);
        let ev = loop {
            let ev = rx.recv().await.expect("event");
            if ev.kind == EventKind::ReconnectScheduled {
                break ev;
            }
        };
        assert_eq!(ev.delay_ms, Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_root_detached_before_timer_opens_nothing() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);
        host.doc.detach(root);

        sleep_ms(1_000).await;
        assert_eq!(transport.opened(), 1);
        assert_eq!(mgr.root_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_on_detached_root_detaches_without_retry() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);
        host.doc.detach(root);

        transport
            .last()
            .error(TransportError::Status { status: 502 }, ReadyState::Closed);

        sleep_ms(1_000).await;
        assert_eq!(transport.opened(), 1);
        assert_eq!(mgr.root_count(), 0);
        assert_eq!(host.fired_on(root), vec![page::ERROR.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_does_not_reconnect() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        transport
            .last()
            .error(TransportError::Ended, ReadyState::Connecting);

        sleep_ms(70_000).await;
        assert_eq!(transport.opened(), 1);
        assert_eq!(mgr.attempt(root), Some(0));
        assert_eq!(host.fired_on(root), vec![page::ERROR.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_trigger_closes_once_without_reconnect() {
        let (host, transport, mgr) = setup();
        let root = host
            .doc
            .add(None, &[("sse-connect", "/events"), ("sse-close", "done")]);
        mgr.process_node(root);
        let feed = transport.last();
        feed.opened();
        let mut rx = mgr.events();

        feed.message(StreamMessage::new("done", ""));
        feed.message(StreamMessage::new("done", ""));

        assert!(feed.is_closed());
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Closed));

        sleep_ms(70_000).await;
        assert_eq!(transport.opened(), 1);

        let mut closes = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ConnectionClosed {
                closes += 1;
            }
        }
        assert_eq!(closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_cancels_pending_retry() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);
        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);

        mgr.cleanup_element(root);

        sleep_ms(1_000).await;
        assert_eq!(transport.opened(), 1);
        assert_eq!(mgr.root_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reprocess_during_backoff_connects_now() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);
        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);

        mgr.process_node(root);
        assert_eq!(transport.opened(), 2);

        sleep_ms(1_000).await;
        assert_eq!(transport.opened(), 2);
        assert_eq!(transport.live_handles().len(), 1);
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/a")]);
        mgr.process_node(root);
        let stale = transport.last().handle().clone();

        host.doc.set_attr(root, "sse-connect", "/b");
        mgr.process_node(root);

        // the feed of a closed handle is silent, so call the hook directly
        mgr.on_open(root, &stale);
        assert_eq!(mgr.root_phase(root), Some(RootPhase::Connecting));
        assert!(host.fired_on(root).iter().all(|n| n != page::OPEN));
    }

    #[test]
    fn test_no_runtime_leaves_root_closed() {
        let (host, transport, mgr) = setup();
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);

        assert_eq!(mgr.root_phase(root), Some(RootPhase::Closed));
        assert_eq!(mgr.attempt(root), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_backoff_is_used() {
        let cfg = Config {
            backoff: BackoffPolicy {
                first: Duration::from_millis(50),
                max: Duration::from_millis(100),
                ..BackoffPolicy::sse()
            },
            ..Config::default()
        };
        let (host, transport, mgr) = setup_with(cfg);
        let root = host.doc.add(None, &[("sse-connect", "/events")]);
        mgr.process_node(root);

        transport
            .last()
            .error(TransportError::Ended, ReadyState::Closed);
        sleep_ms(60).await;
        assert_eq!(transport.opened(), 2);
    }
}
