//! # Connection handle: one stream, one URL.
//!
//! A [`ConnectionHandle`] is the consumer side of a streaming connection; the
//! [`Feed`] is the producer side a [`Transport`](super::Transport) drives.
//!
//! ```text
//! Transport task ── Feed::opened()  ──► on_open hook
//!                ── Feed::message() ──► listeners[event] (in registration order)
//!                ── Feed::error()   ──► on_error hook
//!
//! ConnectionHandle::close() ──► state = Closed, listeners cleared, Feed::closed() resolves
//! ```
//!
//! ## Rules
//! - Notifications run synchronously on the caller of the `Feed` method.
//! - Once the state is `Closed` every further notification is dropped, so a
//!   deliberate close can never surface as an error afterwards.
//! - No lock is held while a hook or listener runs.
//! - No retry logic lives here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

static HANDLE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Connection state as reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    /// Not yet open, or reconnecting inside the transport.
    Connecting,
    /// Streaming.
    Open,
    /// Terminal for this handle.
    Closed,
}

/// One inbound stream event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamMessage {
    /// Event name (`message` when the server sent none).
    pub event: String,
    /// Payload.
    pub data: String,
    /// Last event id seen on the stream.
    pub last_event_id: String,
}

impl StreamMessage {
    /// Creates a message without an id.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            last_event_id: String::new(),
        }
    }

    /// Sets the last event id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = id.into();
        self
    }
}

/// Identifies one listener on one handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a listener wants after handling a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Stay registered.
    Continue,
    /// Remove this listener from the handle.
    Unsubscribe,
}

type Listener = Arc<dyn Fn(&StreamMessage) -> Flow + Send + Sync>;
type OpenHook = Arc<dyn Fn(&ConnectionHandle) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ConnectionHandle, &TransportError) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next: u64,
    by_event: HashMap<String, Vec<(ListenerId, Listener)>>,
}

struct Inner {
    id: u64,
    url: Arc<str>,
    with_credentials: bool,
    state: Mutex<ReadyState>,
    closed: CancellationToken,
    listeners: Mutex<Listeners>,
    on_open: Mutex<Option<OpenHook>>,
    on_error: Mutex<Option<ErrorHook>>,
}

/// Consumer side of one streaming connection. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionHandle {
    /// Creates a handle in [`ReadyState::Connecting`]. Nothing is opened until
    /// its [`Feed`] is handed to a transport.
    pub fn new(url: impl Into<Arc<str>>, with_credentials: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: HANDLE_SEQ.fetch_add(1, Ordering::Relaxed),
                url: url.into(),
                with_credentials,
                state: Mutex::new(ReadyState::Connecting),
                closed: CancellationToken::new(),
                listeners: Mutex::new(Listeners::default()),
                on_open: Mutex::new(None),
                on_error: Mutex::new(None),
            }),
        }
    }

    /// Process-unique handle id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether the request should carry credentials.
    pub fn with_credentials(&self) -> bool {
        self.inner.with_credentials
    }

    /// Current ready state.
    pub fn state(&self) -> ReadyState {
        *self.inner.state.lock()
    }

    /// Shorthand for `state() == Closed`.
    pub fn is_closed(&self) -> bool {
        self.state() == ReadyState::Closed
    }

    /// True if both values refer to the same connection.
    pub fn same(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Installs the open hook (replacing any previous one).
    pub fn on_open(&self, hook: impl Fn(&ConnectionHandle) + Send + Sync + 'static) {
        *self.inner.on_open.lock() = Some(Arc::new(hook));
    }

    /// Installs the error hook (replacing any previous one).
    pub fn on_error(
        &self,
        hook: impl Fn(&ConnectionHandle, &TransportError) + Send + Sync + 'static,
    ) {
        *self.inner.on_error.lock() = Some(Arc::new(hook));
    }

    /// Registers `listener` for stream events named `event`.
    pub fn add_listener(
        &self,
        event: &str,
        listener: impl Fn(&StreamMessage) -> Flow + Send + Sync + 'static,
    ) -> ListenerId {
        let mut listeners = self.inner.listeners.lock();
        listeners.next += 1;
        let id = ListenerId(listeners.next);
        listeners
            .by_event
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let Some(list) = listeners.by_event.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.by_event.remove(event);
        }
        removed
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .by_event
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Closes the connection.
    ///
    /// Idempotent: returns true only for the call that performed the close.
    /// Clears every listener and releases the transport through [`Feed::closed`].
    pub fn close(&self) -> bool {
        if !self.mark_closed() {
            return false;
        }
        self.inner.listeners.lock().by_event.clear();
        true
    }

    /// Producer side for a transport.
    pub fn feed(&self) -> Feed {
        Feed {
            handle: self.clone(),
        }
    }

    fn mark_closed(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if *state == ReadyState::Closed {
                return false;
            }
            *state = ReadyState::Closed;
        }
        self.inner.closed.cancel();
        true
    }

    fn listeners_for(&self, event: &str) -> Vec<(ListenerId, Listener)> {
        self.inner
            .listeners
            .lock()
            .by_event
            .get(event)
            .cloned()
            .unwrap_or_default()
    }
}

/// Producer side of a [`ConnectionHandle`], driven by a transport.
#[derive(Clone)]
pub struct Feed {
    handle: ConnectionHandle,
}

impl Feed {
    /// Endpoint URL to connect to.
    pub fn url(&self) -> &str {
        self.handle.url()
    }

    /// Whether the request should carry credentials.
    pub fn with_credentials(&self) -> bool {
        self.handle.with_credentials()
    }

    /// True once the handle is closed (by the consumer or after a closed-state error).
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Resolves when the handle is closed; transports select on this to stop I/O.
    pub async fn closed(&self) {
        self.handle.inner.closed.cancelled().await;
    }

    /// Reports that the stream is open.
    pub fn opened(&self) {
        {
            let mut state = self.handle.inner.state.lock();
            if *state == ReadyState::Closed {
                return;
            }
            *state = ReadyState::Open;
        }
        let hook = self.handle.inner.on_open.lock().clone();
        if let Some(hook) = hook {
            hook(&self.handle);
        }
    }

    /// Delivers one message to the listeners registered for its event name.
    pub fn message(&self, msg: StreamMessage) {
        if self.handle.is_closed() {
            return;
        }
        for (id, listener) in self.handle.listeners_for(&msg.event) {
            if listener(&msg) == Flow::Unsubscribe {
                self.handle.remove_listener(&msg.event, id);
            }
        }
    }

    /// Reports an error and the state the connection is left in.
    ///
    /// `ReadyState::Closed` means the transport gave up; the consumer decides
    /// whether to open a new handle.
    pub fn error(&self, error: TransportError, state: ReadyState) {
        match state {
            ReadyState::Closed => {
                if !self.handle.mark_closed() {
                    return;
                }
            }
            other => {
                let mut current = self.handle.inner.state.lock();
                if *current == ReadyState::Closed {
                    return;
                }
                *current = other;
            }
        }
        let hook = self.handle.inner.on_error.lock().clone();
        if let Some(hook) = hook {
            hook(&self.handle, &error);
        }
    }

    /// The handle this feed drives.
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_new_handle_is_connecting() {
        let h = ConnectionHandle::new("/events", true);
        assert_eq!(h.state(), ReadyState::Connecting);
        assert_eq!(h.url(), "/events");
        assert!(h.with_credentials());
    }

    #[test]
    fn test_open_sets_state_and_fires_hook() {
        let h = ConnectionHandle::new("/events", true);
        let hits = Arc::new(AtomicUsize::new(0));
        let c = hits.clone();
        h.on_open(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        h.feed().opened();
        assert_eq!(h.state(), ReadyState::Open);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_message_routes_by_event_name() {
        let h = ConnectionHandle::new("/events", true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        h.add_listener("update", move |m| {
            s.lock().push(m.data.clone());
            Flow::Continue
        });

        let feed = h.feed();
        feed.message(StreamMessage::new("update", "one"));
        feed.message(StreamMessage::new("create", "ignored"));
        feed.message(StreamMessage::new("update", "two"));

        assert_eq!(*seen.lock(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let h = ConnectionHandle::new("/events", true);
        let hits = Arc::new(AtomicUsize::new(0));
        let c = hits.clone();
        h.add_listener("tick", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Flow::Unsubscribe
        });

        let feed = h.feed();
        feed.message(StreamMessage::new("tick", ""));
        feed.message(StreamMessage::new("tick", ""));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(h.listener_count("tick"), 0);
    }

    #[test]
    fn test_remove_listener() {
        let h = ConnectionHandle::new("/events", true);
        let id = h.add_listener("a", |_| Flow::Continue);
        assert!(h.remove_listener("a", id));
        assert!(!h.remove_listener("a", id));
        assert!(!h.remove_listener("b", id));
    }

    #[test]
    fn test_close_is_idempotent_and_silences_feed() {
        let h = ConnectionHandle::new("/events", true);
        let errors = Arc::new(AtomicUsize::new(0));
        let c = errors.clone();
        h.on_error(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        h.add_listener("a", |_| Flow::Continue);

        assert!(h.close());
        assert!(!h.close());
        assert_eq!(h.listener_count("a"), 0);

        let feed = h.feed();
        feed.error(TransportError::Ended, ReadyState::Closed);
        feed.opened();
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(h.state(), ReadyState::Closed);
    }

    #[test]
    fn test_closed_error_is_reported_once() {
        let h = ConnectionHandle::new("/events", true);
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        h.on_error(move |handle, _| s.lock().push(handle.state()));

        let feed = h.feed();
        feed.error(TransportError::Ended, ReadyState::Connecting);
        feed.error(TransportError::Ended, ReadyState::Closed);
        feed.error(TransportError::Ended, ReadyState::Closed);

        assert_eq!(
            *states.lock(),
            vec![ReadyState::Connecting, ReadyState::Closed]
        );
        assert!(!h.close());
    }

    #[tokio::test]
    async fn test_closed_future_resolves_on_close() {
        let h = ConnectionHandle::new("/events", true);
        let feed = h.feed();
        let waiter = tokio::spawn(async move { feed.closed().await });
        h.close();
        waiter.await.expect("waiter joins");
    }
}
