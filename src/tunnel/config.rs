//! Tunnel configuration

use crate::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Tunnel configuration
///
/// Defaults: loopback listener on an ephemeral port, no dial timeout, no
/// connection limit, `TCP_NODELAY` on accepted sockets.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Address the local listener binds to
    pub bind_addr: SocketAddr,
    /// Upper bound on dialing the remote target
    pub dial_timeout: Option<Duration>,
    /// Maximum concurrent relays
    ///
    /// Further clients wait in the listener backlog until a relay finishes.
    pub max_connections: Option<usize>,
    /// Set `TCP_NODELAY` on accepted connections
    pub nodelay: bool,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            dial_timeout: None,
            max_connections: None,
            nodelay: true,
        }
    }
}

impl TunnelConfig {
    /// Create a builder starting from the defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use fraiseql_tunnel::TunnelConfig;
    /// use std::time::Duration;
    ///
    /// let config = TunnelConfig::builder()
    ///     .dial_timeout(Duration::from_secs(10))
    ///     .max_connections(32)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_connections, Some(32));
    /// ```
    pub fn builder() -> TunnelConfigBuilder {
        TunnelConfigBuilder {
            config: TunnelConfig::default(),
        }
    }
}

/// Builder for [`TunnelConfig`]
#[derive(Debug, Clone)]
pub struct TunnelConfigBuilder {
    config: TunnelConfig,
}

impl TunnelConfigBuilder {
    /// Set the listener bind address
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the dial timeout
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.config.dial_timeout = Some(timeout);
        self
    }

    /// Limit concurrent relays
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = Some(max);
        self
    }

    /// Set `TCP_NODELAY` on accepted connections
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<TunnelConfig> {
        if self.config.max_connections == Some(0) {
            return Err(Error::Config("max_connections must be at least 1".into()));
        }
        if self.config.dial_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("dial_timeout must be positive".into()));
        }
        Ok(self.config)
    }
}
