//! Histogram metrics

use super::labels;

/// Time spent dialing the remote target
pub fn tunnel_dial_duration(duration_ms: u64) {
    ::metrics::histogram!(labels::TUNNEL_DIAL_DURATION).record(duration_ms as f64);
}

/// Bytes copied by one relay direction before it finished
pub fn tunnel_relay_bytes(direction: &'static str, bytes: u64) {
    ::metrics::histogram!(labels::TUNNEL_RELAY_BYTES, labels::LABEL_DIRECTION => direction)
        .record(bytes as f64);
}
