//! Connection strings
//!
//! Parsing for the driver and structural rewriting for the tunnel.

mod connection_string;

pub use connection_string::{ConnectionInfo, ConnectionUri};
pub(crate) use connection_string::format_host_port;
