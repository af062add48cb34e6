//! Minimal trigger-specification parsing.
//!
//! Hosts with a full trigger language override [`Document::trigger_specs`](super::Document::trigger_specs);
//! this parser only extracts the trigger names, which is all the manager reads.

/// One parsed trigger specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    /// Trigger name, e.g. `click` or `sse:update`.
    pub trigger: String,
}

impl TriggerSpec {
    /// Creates a spec for the given trigger name.
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
        }
    }
}

/// Splits `raw` on commas and keeps the first whitespace-separated token of
/// each entry (modifiers such as `delay:1s` are dropped).
pub fn parse_trigger_specs(raw: &str) -> Vec<TriggerSpec> {
    raw.split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .map(TriggerSpec::new)
        .collect()
}
