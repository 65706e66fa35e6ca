//! Link configuration.

use std::time::Duration;

/// Behavior knobs for a [`Link`](crate::link::Link) instance.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Deadline applied to `invoke_method` calls whose request attributes
    /// carry no time-to-live.
    pub default_call_timeout: Duration,
    /// Whether `send` of a RESPONSE may satisfy a locally pending call
    /// directly, without a network hop. When `false`, only envelopes
    /// arriving through the transport's inbound path (`Link::deliver`)
    /// fulfill pending calls.
    pub local_response_resolution: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_call_timeout: Duration::from_secs(30),
            local_response_resolution: true,
        }
    }
}
