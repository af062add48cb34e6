//! Runtime core: roots, bindings and delivery.
//!
//! The only public API from this module is [`Manager`] (with its builder) and
//! the small value types it reports. Internal modules:
//! - [`manager`]: public entry point, shared state, host event routing;
//! - [`supervisor`]: per-root connection lifecycle and reconnect backoff;
//! - [`registry`]: per-element listener bookkeeping and rebinding;
//! - [`alive`]: liveness probes run before every callback acts;
//! - [`dispatch`]: subscription resolution and message delivery to the host;
//! - [`builder`]: manager construction and observer wiring.

mod alive;
mod builder;
mod dispatch;
mod manager;
mod registry;
mod supervisor;

pub use builder::ManagerBuilder;
pub use dispatch::{Subscription, SubscriptionMode};
pub use manager::{Manager, SELECTORS};
pub use supervisor::RootPhase;
