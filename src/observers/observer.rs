//! # Observer trait.
//!
//! Provides [`Observe`], the extension point for plugging custom runtime event
//! handlers (metrics, audit, structured logging) into a manager.
//!
//! Each observer gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-observer bounded queue** (capacity via [`Observe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::ObserverPanicked`)
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use streamvisor::{Event, EventKind, Observe};
//!
//! struct Reconnects;
//!
//! #[async_trait]
//! impl Observe for Reconnects {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ReconnectScheduled) {
//!             // bump a counter, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "reconnects" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Runtime event observer.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this observer's queue.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per observer.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
