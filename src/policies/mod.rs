//! Reconnect policies.
//!
//! This module groups the knobs that control **how long** a subscription root
//! waits before opening a fresh connection after its stream failed.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid reconnect storms
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::supervisor on a closed-state error:
//!           attempt += 1; delay = backoff.next(attempt); sleep(delay); reattach
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::sse()` → first=500ms, factor=2.0, max=64s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
