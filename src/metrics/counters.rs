//! Counter metrics

use super::labels;

/// A connection was accepted on a tunnel listener
pub fn tunnel_connection_accepted() {
    ::metrics::counter!(labels::TUNNEL_CONNECTIONS_ACCEPTED).increment(1);
}

/// The accept loop stopped because accept returned an error
pub fn tunnel_accept_error() {
    ::metrics::counter!(labels::TUNNEL_ACCEPT_ERRORS).increment(1);
}

/// Dialing the remote target failed
pub fn tunnel_dial_failed(reason: &'static str) {
    ::metrics::counter!(labels::TUNNEL_DIAL_FAILURES, labels::LABEL_REASON => reason).increment(1);
}

/// A relay finished both copy directions
pub fn tunnel_relay_completed() {
    ::metrics::counter!(labels::TUNNEL_RELAYS_COMPLETED).increment(1);
}

/// An authentication exchange began
pub fn auth_attempted(mechanism: &'static str) {
    ::metrics::counter!(labels::AUTH_ATTEMPTED, labels::LABEL_MECHANISM => mechanism).increment(1);
}

/// Authentication finished successfully
pub fn auth_successful(mechanism: &'static str) {
    ::metrics::counter!(labels::AUTH_SUCCESSFUL, labels::LABEL_MECHANISM => mechanism).increment(1);
}

/// Authentication was rejected
pub fn auth_failed(mechanism: &'static str, reason: &'static str) {
    ::metrics::counter!(
        labels::AUTH_FAILED,
        labels::LABEL_MECHANISM => mechanism,
        labels::LABEL_REASON => reason
    )
    .increment(1);
}
