//! # Example: http_stream
//!
//! Subscribes a tiny static page to a real server-sent-events endpoint and
//! prints every swap and page event. Kill the server mid-run to watch the
//! reconnect backoff (500ms, 1s, 2s, …) in the `LogWriter` output.
//!
//! ## Page
//! ```text
//! #1 <div sse-connect=URL sse-close="done">
//! #2   <div sse-swap="message,update">
//! #3   <div hx-trigger="sse:ping">
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example http_stream --features http,logging -- http://localhost:8080/events
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use streamvisor::{
    Config, Dispatch, Document, ElementId, EventDetail, Host, HttpTransport, Liveness, LogWriter,
    Manager, Observe, Swap, SwapError,
};
use tracing_subscriber::EnvFilter;

struct StaticPage {
    attrs: HashMap<(u64, &'static str), String>,
}

impl StaticPage {
    fn new(url: String) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert((1, "sse-connect"), url);
        attrs.insert((1, "sse-close"), "done".to_string());
        attrs.insert((2, "sse-swap"), "message,update".to_string());
        attrs.insert((3, "hx-trigger"), "sse:ping".to_string());
        Self { attrs }
    }
}

impl Document for StaticPage {
    fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|((id, n), _)| *id == el.0 && *n == name)
            .map(|(_, v)| v.clone())
    }

    fn parent(&self, el: ElementId) -> Option<ElementId> {
        (el.0 > 1).then_some(ElementId(1))
    }

    fn descendants(&self, el: ElementId) -> Vec<ElementId> {
        if el.0 == 1 {
            vec![ElementId(2), ElementId(3)]
        } else {
            Vec::new()
        }
    }
}

impl Liveness for StaticPage {
    fn is_live(&self, _el: ElementId) -> bool {
        true
    }
}

impl Dispatch for StaticPage {
    fn trigger(&self, el: ElementId, name: &str, detail: EventDetail<'_>) -> bool {
        match detail {
            EventDetail::Message(msg) => println!("[page] #{} {name} data={:?}", el.0, msg.data),
            EventDetail::Open { source } => println!("[page] #{} {name} url={}", el.0, source.url()),
            EventDetail::Error { error, .. } => println!("[page] #{} {name} error={error}", el.0),
        }
        true
    }
}

impl Swap for StaticPage {
    fn swap(&self, el: ElementId, payload: &str) -> Result<(), SwapError> {
        println!("[swap] #{} <- {payload}", el.0);
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());

    let page = Arc::new(StaticPage::new(url));
    let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter::new())];

    let manager = Manager::builder(Host::from_shared(page), Arc::new(HttpTransport::new()?))
        .with_config(Config::default())
        .with_observers(observers)
        .build();

    for id in 1..=3 {
        manager.process_node(ElementId(id));
    }

    tokio::time::sleep(Duration::from_secs(60)).await;
    manager.cleanup_element(ElementId(1));
    Ok(())
}
