//! # Liveness checks guarding every callback.
//!
//! Elements can leave the document at any time without the manager being told.
//! Every hook and listener therefore asks the host before acting:
//!
//! ```text
//! callback ──► probe_root(root) ── not live ──► detach_root(root) ──► stop
//!                     │
//!                   live
//!                     ▼
//!              is_live(element) ── not live ──► prune element bindings ──► stop
//!                     │
//!                   live
//!                     ▼
//!                  proceed
//! ```

use std::sync::Arc;

use super::manager::Manager;
use crate::host::{ElementId, Liveness};

/// Thin wrapper over the host's [`Liveness`] service.
pub(crate) struct LivenessChecker {
    liveness: Arc<dyn Liveness>,
}

impl LivenessChecker {
    pub(crate) fn new(liveness: Arc<dyn Liveness>) -> Self {
        Self { liveness }
    }

    #[inline]
    pub(crate) fn is_live(&self, el: ElementId) -> bool {
        self.liveness.is_live(el)
    }
}

impl Manager {
    /// Returns true if `root` is live. Otherwise detaches it (closing its
    /// connection exactly once) and returns false.
    pub(crate) fn probe_root(&self, root: ElementId) -> bool {
        if self.inner.alive.is_live(root) {
            return true;
        }
        self.detach_root(root);
        false
    }
}
