//! Remote target of a tunnel

use crate::client::{format_host_port, ConnectionUri};
use std::fmt;

/// The real `host:port` a tunnel reaches through its dialer
///
/// Taken from the base connection URI once, when the opener is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    host: String,
    port: u16,
}

impl TargetDescriptor {
    /// Target for `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Target named by a connection URI (port defaults to 5432)
    pub fn from_uri(uri: &ConnectionUri) -> Self {
        Self::new(uri.host(), uri.port_or_default())
    }

    /// Host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address handed to the dialer (`host:port`, IPv6 bracketed)
    pub fn addr(&self) -> String {
        format_host_port(&self.host, self.port)
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr())
    }
}
