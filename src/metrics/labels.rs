//! Metric names and label values

/// Connections accepted on the tunnel listener
pub const TUNNEL_CONNECTIONS_ACCEPTED: &str = "fraiseql_tunnel_connections_accepted_total";
/// Accept errors that stopped a tunnel's accept loop
pub const TUNNEL_ACCEPT_ERRORS: &str = "fraiseql_tunnel_accept_errors_total";
/// Remote dials that failed
pub const TUNNEL_DIAL_FAILURES: &str = "fraiseql_tunnel_dial_failures_total";
/// Relays that ran both copy directions to completion
pub const TUNNEL_RELAYS_COMPLETED: &str = "fraiseql_tunnel_relays_completed_total";
/// Bytes copied by one relay direction
pub const TUNNEL_RELAY_BYTES: &str = "fraiseql_tunnel_relay_bytes";
/// Time to establish the remote stream through the dialer
pub const TUNNEL_DIAL_DURATION: &str = "fraiseql_tunnel_dial_duration_ms";
/// Relays currently running
pub const TUNNEL_ACTIVE_RELAYS: &str = "fraiseql_tunnel_active_relays";

/// Authentication attempts by mechanism
pub const AUTH_ATTEMPTED: &str = "fraiseql_auth_attempted_total";
/// Successful authentications by mechanism
pub const AUTH_SUCCESSFUL: &str = "fraiseql_auth_successful_total";
/// Failed authentications by mechanism and reason
pub const AUTH_FAILED: &str = "fraiseql_auth_failed_total";

/// Label: relay direction
pub const LABEL_DIRECTION: &str = "direction";
/// Label: failure reason
pub const LABEL_REASON: &str = "reason";
/// Label: authentication mechanism
pub const LABEL_MECHANISM: &str = "mechanism";

/// Client (driver) to remote server
pub const DIRECTION_UPSTREAM: &str = "upstream";
/// Remote server to client (driver)
pub const DIRECTION_DOWNSTREAM: &str = "downstream";

/// The dialer returned an error
pub const REASON_ERROR: &str = "error";
/// The dial did not finish within `dial_timeout`
pub const REASON_TIMEOUT: &str = "timeout";
/// The server rejected the credentials
pub const REASON_SERVER_ERROR: &str = "server_error";

/// Cleartext password authentication
pub const MECHANISM_CLEARTEXT: &str = "cleartext";
/// SCRAM-SHA-256 authentication
pub const MECHANISM_SCRAM: &str = "scram-sha-256";
/// Server accepted the connection without a password exchange
pub const MECHANISM_TRUST: &str = "trust";
