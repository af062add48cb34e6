//! Declarative attribute names and lookup.

use super::{Document, ElementId};

/// Attribute names the manager reads.
pub mod names {
    /// Endpoint URL; marks a subscription root.
    pub const CONNECT: &str = "sse-connect";
    /// Comma-separated stream event names to swap in.
    pub const SWAP: &str = "sse-swap";
    /// Stream event name that closes the root's connection.
    pub const CLOSE: &str = "sse-close";
    /// Host trigger specification.
    pub const TRIGGER: &str = "hx-trigger";
}

/// Looks up `name`, then `data-<name>`.
///
/// Empty values count as absent.
pub fn attribute_value<D>(doc: &D, el: ElementId, name: &str) -> Option<String>
where
    D: Document + ?Sized,
{
    doc.attribute(el, name)
        .or_else(|| doc.attribute(el, &format!("data-{name}")))
        .filter(|v| !v.is_empty())
}
