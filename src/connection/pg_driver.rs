//! `Driver` implementation for the bundled Postgres client

use super::conn::{Connection, ConnectionConfig};
use super::state::ConnectionState;
use super::transport::Transport;
use crate::client::ConnectionInfo;
use crate::driver::{Driver, DriverConnection, ExecResult};
use crate::Result;
use futures::future::BoxFuture;
use std::time::Duration;

/// Postgres driver
///
/// Opens a [`Connection`] from a `postgres://` connection string. Settings
/// given here apply to every connection unless the connection string sets
/// them itself.
#[derive(Debug, Clone, Default)]
pub struct PgDriver {
    application_name: Option<String>,
    statement_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl PgDriver {
    /// Driver with no defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default application name
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Default statement timeout
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Default TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn config_for(&self, info: &ConnectionInfo) -> ConnectionConfig {
        let mut config = info.to_config();
        if config.application_name.is_none() {
            config.application_name = self.application_name.clone();
        }
        if config.connect_timeout.is_none() {
            config.connect_timeout = self.connect_timeout;
        }
        config.statement_timeout = self.statement_timeout;
        config
    }
}

impl Driver for PgDriver {
    type Connection = Connection;

    fn open<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, Result<Connection>> {
        Box::pin(async move {
            let info = ConnectionInfo::parse(connection_string)?;
            let config = self.config_for(&info);

            tracing::debug!(host = %info.host, port = info.port, "opening postgres connection");
            let transport =
                Transport::connect_tcp(&info.host, info.port, config.connect_timeout).await?;

            let mut conn = Connection::new(transport);
            conn.startup(&config).await?;
            Ok(conn)
        })
    }
}

impl DriverConnection for Connection {
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ExecResult>> {
        Box::pin(Connection::execute(self, sql))
    }

    fn close(self) -> BoxFuture<'static, Result<()>> {
        Box::pin(Connection::close(self))
    }

    fn is_broken(&self) -> bool {
        // Anything but idle means a query was abandoned midway
        Connection::is_broken(self) || self.state() != ConnectionState::Idle
    }
}
