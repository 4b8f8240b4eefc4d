//! Reconnect policy for the persistent session.

use std::time::Duration;

/// Controls how the client reconnects after the session drops.
///
/// The authority expects clients to come back on a fixed cadence: the
/// delay never grows and there is no attempt cap, so a reachable server is
/// always eventually rejoined.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay between a closure and the next connection attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (0-indexed). Fixed for every attempt.
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
