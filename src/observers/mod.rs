//! # Runtime event observers.
//!
//! This module provides the [`Observe`] trait and the [`ObserverSet`] that
//! fans runtime events out to every registered observer.
//!
//! ## Architecture
//! ```text
//! supervisor / registry / bridge ── publish(Event) ──► Bus
//!                                                       │
//!                                        observer listener (spawned by builder)
//!                                                       ▼
//!                                                ObserverSet::emit
//!                                       ┌───────────────┼───────────────┐
//!                                       ▼               ▼               ▼
//!                                   LogWriter        Metrics         Custom
//! ```

mod observer;
mod set;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use observer::Observe;
pub use set::ObserverSet;
