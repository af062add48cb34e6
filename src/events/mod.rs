//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the manager.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: reconnect supervisor, listener registry, dispatch bridge,
//!   `ObserverSet` workers (overflow/panic).
//! - **Consumers**: the observer listener spawned by the builder, and any
//!   receiver obtained through `Manager::events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
