//! Gauge metrics

use super::labels;

/// RAII marker for a running relay
///
/// Increments the active-relay gauge on creation and decrements it on drop.
#[derive(Debug)]
pub struct ActiveRelay(());

impl ActiveRelay {
    /// Record a relay as started
    pub fn start() -> Self {
        ::metrics::gauge!(labels::TUNNEL_ACTIVE_RELAYS).increment(1.0);
        Self(())
    }
}

impl Drop for ActiveRelay {
    fn drop(&mut self) {
        ::metrics::gauge!(labels::TUNNEL_ACTIVE_RELAYS).decrement(1.0);
    }
}
