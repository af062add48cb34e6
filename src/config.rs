//! # Manager configuration.
//!
//! Provides [`Config`], the centralized settings handed to
//! [`Manager::builder`](crate::Manager::builder) via
//! [`ManagerBuilder::with_config`](crate::ManagerBuilder::with_config).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `trigger_prefix = ""` → falls back to `"sse:"`

use crate::policies::BackoffPolicy;

/// Default stream-event marker in trigger specifications.
pub const DEFAULT_TRIGGER_PREFIX: &str = "sse:";

/// Global configuration for a manager.
///
/// ## Field semantics
/// - `bus_capacity`: runtime event ring buffer size (min 1)
/// - `backoff`: reconnect schedule per subscription root
/// - `with_credentials`: whether connections carry credentials (cookies)
/// - `trigger_prefix`: marker that turns a trigger spec into a stream binding
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the runtime event bus.
    ///
    /// Receivers that lag more than this skip older events.
    pub bus_capacity: usize,

    /// Reconnect backoff applied after a closed-state transport error.
    pub backoff: BackoffPolicy,

    /// Open connections with credentials included.
    pub with_credentials: bool,

    /// Prefix marking stream-event triggers, e.g. `sse:update`.
    pub trigger_prefix: String,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the trigger prefix, falling back to the default when empty.
    #[inline]
    pub fn trigger_prefix(&self) -> &str {
        if self.trigger_prefix.is_empty() {
            DEFAULT_TRIGGER_PREFIX
        } else {
            &self.trigger_prefix
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `backoff = BackoffPolicy::sse()` (500ms doubling to 64s)
    /// - `with_credentials = true`
    /// - `trigger_prefix = "sse:"`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            backoff: BackoffPolicy::sse(),
            with_credentials: true,
            trigger_prefix: DEFAULT_TRIGGER_PREFIX.to_string(),
        }
    }
}
