//! Core connection type

use super::state::ConnectionState;
use super::transport::Transport;
use crate::auth::ScramClient;
use crate::driver::ExecResult;
use crate::metrics::labels;
use crate::protocol::constants::tx_status;
use crate::protocol::{
    decode_message, encode_message, AuthenticationMessage, BackendMessage, FrontendMessage,
};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tracing::Instrument;

/// Connection configuration
///
/// Stores connection parameters including database, credentials, and optional timeouts.
/// Use `ConnectionConfig::builder()` for the optional settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database name
    pub database: String,
    /// Username
    pub user: String,
    /// Password (optional)
    pub password: Option<String>,
    /// Additional startup parameters
    pub params: HashMap<String, String>,
    /// TCP connection timeout
    pub connect_timeout: Option<Duration>,
    /// Query statement timeout
    pub statement_timeout: Option<Duration>,
    /// Application name for Postgres logs
    pub application_name: Option<String>,
}

impl ConnectionConfig {
    /// Create new configuration with no timeouts and no application name
    pub fn new(database: impl Into<String>, user: impl Into<String>) -> Self {
        Self::builder(database, user).build()
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use fraiseql_tunnel::connection::ConnectionConfig;
    /// use std::time::Duration;
    ///
    /// let config = ConnectionConfig::builder("postgres", "admin")
    ///     .password("secret")
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .application_name("provisioner")
    ///     .build();
    /// assert_eq!(config.user, "admin");
    /// ```
    pub fn builder(
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            database: database.into(),
            user: user.into(),
            password: None,
            params: HashMap::new(),
            connect_timeout: None,
            statement_timeout: None,
            application_name: None,
        }
    }

    /// Set password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add connection parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Startup message parameters, in the order they are sent
    fn startup_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("user".to_string(), self.user.clone()),
            ("database".to_string(), self.database.clone()),
        ];
        if let Some(app_name) = &self.application_name {
            params.push(("application_name".to_string(), app_name.clone()));
        }
        if let Some(timeout) = self.statement_timeout {
            params.push((
                "statement_timeout".to_string(),
                timeout.as_millis().to_string(),
            ));
        }
        let mut extra: Vec<_> = self.params.iter().collect();
        extra.sort();
        for (k, v) in extra {
            params.push((k.clone(), v.clone()));
        }
        params
    }
}

/// Builder for creating `ConnectionConfig` with advanced options
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    database: String,
    user: String,
    password: Option<String>,
    params: HashMap<String, String>,
    connect_timeout: Option<Duration>,
    statement_timeout: Option<Duration>,
    application_name: Option<String>,
}

impl ConnectionConfigBuilder {
    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add a startup parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set TCP connection timeout
    ///
    /// Default: None (no timeout). Through a tunnel this bounds the connect to
    /// the local listener only; the remote dial is bounded by
    /// [`TunnelConfig`](crate::TunnelConfig).
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set statement (query) timeout
    ///
    /// Default: None (unlimited)
    pub fn statement_timeout(mut self, duration: Duration) -> Self {
        self.statement_timeout = Some(duration);
        self
    }

    /// Set application name for Postgres logs
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            database: self.database,
            user: self.user,
            password: self.password,
            params: self.params,
            connect_timeout: self.connect_timeout,
            statement_timeout: self.statement_timeout,
            application_name: self.application_name,
        }
    }
}

/// Postgres connection
pub struct Connection {
    transport: Transport,
    state: ConnectionState,
    read_buf: BytesMut,
    process_id: Option<i32>,
    tx_status: u8,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("process_id", &self.process_id)
            .finish()
    }
}

impl Connection {
    /// Create connection from transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            state: ConnectionState::Initial,
            read_buf: BytesMut::with_capacity(8192),
            process_id: None,
            tx_status: tx_status::IDLE,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the transport failed and the connection must be discarded
    pub fn is_broken(&self) -> bool {
        matches!(self.state, ConnectionState::Broken | ConnectionState::Closed)
    }

    /// Backend process ID reported during startup
    pub fn process_id(&self) -> Option<i32> {
        self.process_id
    }

    /// Transaction status from the last ReadyForQuery (`I`, `T` or `E`)
    pub fn transaction_status(&self) -> u8 {
        self.tx_status
    }

    /// Perform startup and authentication
    pub async fn startup(&mut self, config: &ConnectionConfig) -> Result<()> {
        async {
            self.state.transition(ConnectionState::AwaitingAuth)?;

            let startup = FrontendMessage::Startup {
                version: crate::protocol::constants::PROTOCOL_VERSION,
                params: config.startup_params(),
            };
            self.send_message(&startup).await?;

            self.state.transition(ConnectionState::Authenticating)?;
            self.authenticate(config).await?;

            self.state.transition(ConnectionState::Idle)?;
            tracing::info!("startup complete");
            Ok(())
        }
        .instrument(tracing::info_span!(
            "startup",
            user = %config.user,
            database = %config.database
        ))
        .await
    }

    /// Handle authentication, reading until ReadyForQuery
    async fn authenticate(&mut self, config: &ConnectionConfig) -> Result<()> {
        let mut mechanism = labels::MECHANISM_TRUST;

        loop {
            let msg = self.receive_message().await?;

            match msg {
                BackendMessage::Authentication(auth) => match auth {
                    AuthenticationMessage::Ok => {
                        tracing::debug!(mechanism, "authentication successful");
                        crate::metrics::counters::auth_successful(mechanism);
                        // ReadyForQuery still follows
                    }
                    AuthenticationMessage::CleartextPassword => {
                        mechanism = labels::MECHANISM_CLEARTEXT;
                        crate::metrics::counters::auth_attempted(mechanism);

                        let password = config
                            .password
                            .as_ref()
                            .ok_or_else(|| Error::Authentication("password required".into()))?;
                        self.send_message(&FrontendMessage::Password(password.clone()))
                            .await?;
                    }
                    AuthenticationMessage::Md5Password { .. } => {
                        return Err(Error::Authentication(
                            "MD5 authentication not supported. Use SCRAM-SHA-256 or cleartext password".into(),
                        ));
                    }
                    AuthenticationMessage::Sasl { mechanisms } => {
                        mechanism = labels::MECHANISM_SCRAM;
                        crate::metrics::counters::auth_attempted(mechanism);
                        if let Err(e) = self.handle_sasl(&mechanisms, config).await {
                            crate::metrics::counters::auth_failed(mechanism, labels::REASON_ERROR);
                            return Err(e);
                        }
                    }
                    AuthenticationMessage::SaslContinue { .. }
                    | AuthenticationMessage::SaslFinal { .. } => {
                        return Err(Error::Protocol(
                            "unexpected SASL message outside of SASL flow".into(),
                        ));
                    }
                },
                BackendMessage::BackendKeyData { process_id, .. } => {
                    self.process_id = Some(process_id);
                }
                BackendMessage::ParameterStatus { name, value } => {
                    tracing::debug!("parameter status: {} = {}", name, value);
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!("notice during startup: {}", notice);
                }
                BackendMessage::ReadyForQuery { status } => {
                    self.tx_status = status;
                    return Ok(());
                }
                BackendMessage::ErrorResponse(err) => {
                    crate::metrics::counters::auth_failed(mechanism, labels::REASON_SERVER_ERROR);
                    return Err(Error::Authentication(err.to_string()));
                }
                _ => {
                    return Err(Error::Protocol(format!(
                        "unexpected message during auth: {:?}",
                        msg
                    )));
                }
            }
        }
    }

    /// Handle SASL authentication (SCRAM-SHA-256)
    async fn handle_sasl(&mut self, mechanisms: &[String], config: &ConnectionConfig) -> Result<()> {
        if !mechanisms.iter().any(|m| m == "SCRAM-SHA-256") {
            return Err(Error::Authentication(format!(
                "server does not support SCRAM-SHA-256. Available: {}",
                mechanisms.join(", ")
            )));
        }

        let password = config.password.as_ref().ok_or_else(|| {
            Error::Authentication("password required for SCRAM authentication".into())
        })?;

        let mut scram = ScramClient::new(config.user.clone(), password.clone());
        tracing::debug!("initiating SCRAM-SHA-256 authentication");

        self.send_message(&FrontendMessage::SaslInitialResponse {
            mechanism: "SCRAM-SHA-256".to_string(),
            data: scram.client_first().into_bytes(),
        })
        .await?;

        let server_first = match self.receive_message().await? {
            BackendMessage::Authentication(AuthenticationMessage::SaslContinue { data }) => data,
            BackendMessage::ErrorResponse(err) => {
                return Err(Error::Authentication(format!("SASL server error: {}", err)));
            }
            _ => {
                return Err(Error::Protocol(
                    "expected SaslContinue message during SASL authentication".into(),
                ));
            }
        };
        let server_first = String::from_utf8(server_first).map_err(|e| {
            Error::Authentication(format!("invalid UTF-8 in server first message: {}", e))
        })?;

        let (client_final, scram_state) = scram
            .client_final(&server_first)
            .map_err(|e| Error::Authentication(format!("SCRAM error: {}", e)))?;

        self.send_message(&FrontendMessage::SaslResponse {
            data: client_final.into_bytes(),
        })
        .await?;

        let server_final = match self.receive_message().await? {
            BackendMessage::Authentication(AuthenticationMessage::SaslFinal { data }) => data,
            BackendMessage::ErrorResponse(err) => {
                return Err(Error::Authentication(format!("SASL server error: {}", err)));
            }
            _ => {
                return Err(Error::Protocol(
                    "expected SaslFinal message during SASL authentication".into(),
                ));
            }
        };
        let server_final = String::from_utf8(server_final).map_err(|e| {
            Error::Authentication(format!("invalid UTF-8 in server final message: {}", e))
        })?;

        scram
            .verify_server_final(&server_final, &scram_state)
            .map_err(|e| Error::Authentication(format!("SCRAM verification failed: {}", e)))?;

        tracing::debug!("SCRAM-SHA-256 server signature verified");
        Ok(())
    }

    /// Execute a simple query (returns all backend messages up to and including ReadyForQuery)
    pub async fn simple_query(&mut self, query: &str) -> Result<Vec<BackendMessage>> {
        if !self.state.is_idle() {
            return Err(Error::ConnectionBusy(format!(
                "connection in state: {}",
                self.state
            )));
        }

        self.state.transition(ConnectionState::QueryInProgress)?;
        self.send_message(&FrontendMessage::Query(query.to_string()))
            .await?;
        self.state.transition(ConnectionState::ReadingResults)?;

        let mut messages = Vec::new();
        loop {
            let msg = self.receive_message().await?;
            if let BackendMessage::ReadyForQuery { status } = msg {
                self.tx_status = status;
            }
            let done = msg.is_ready_for_query();
            messages.push(msg);
            if done {
                break;
            }
        }

        self.state.transition(ConnectionState::Idle)?;
        Ok(messages)
    }

    /// Execute one or more statements, returning their command tags
    ///
    /// The first `ErrorResponse` aborts the batch and is returned as
    /// [`Error::Sql`] once the server is ready again, leaving the
    /// connection usable.
    pub async fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        let messages = self
            .simple_query(sql)
            .instrument(tracing::debug_span!("execute"))
            .await?;

        let mut command_tags = Vec::new();
        for msg in messages {
            match msg {
                BackendMessage::CommandComplete(tag) => command_tags.push(tag),
                BackendMessage::ErrorResponse(fields) => return Err(Error::Sql(fields)),
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!("notice: {}", notice);
                }
                _ => {}
            }
        }

        Ok(ExecResult::new(command_tags))
    }

    /// Send a frontend message
    async fn send_message(&mut self, msg: &FrontendMessage) -> Result<()> {
        let buf = encode_message(msg)?;
        let sent = async {
            self.transport.write_all(&buf).await?;
            self.transport.flush().await
        }
        .await;
        if sent.is_err() {
            self.state = ConnectionState::Broken;
        }
        sent
    }

    /// Receive a backend message
    async fn receive_message(&mut self) -> Result<BackendMessage> {
        loop {
            match decode_message(&mut self.read_buf) {
                Ok((msg, consumed)) => {
                    self.read_buf.advance(consumed);
                    return Ok(msg);
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => {
                    self.state = ConnectionState::Broken;
                    return Err(Error::Protocol(e.to_string()));
                }
            }

            match self.transport.read_buf(&mut self.read_buf).await {
                Ok(0) => {
                    self.state = ConnectionState::Broken;
                    return Err(Error::ConnectionClosed);
                }
                Ok(_) => {}
                Err(e) => {
                    self.state = ConnectionState::Broken;
                    return Err(e);
                }
            }
        }
    }

    /// Close the connection (Terminate, then shut down the socket)
    pub async fn close(mut self) -> Result<()> {
        let was_broken = self.is_broken();
        self.state.transition(ConnectionState::Closed)?;
        if was_broken {
            return Ok(());
        }
        let _ = self.send_message(&FrontendMessage::Terminate).await;
        self.transport.shutdown().await
    }
}
