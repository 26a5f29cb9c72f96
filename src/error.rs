//! Error types

use crate::protocol::ErrorFields;
use std::io;
use thiserror::Error;

/// Main error type for fraiseql-tunnel operations
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration (connection string, logical name, builder values)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The tunnel's local listener could not be bound
    #[error("failed to bind tunnel listener on {addr}: {source}")]
    Bind {
        /// Requested bind address
        addr: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The remote target could not be reached through the dialer
    #[error("failed to dial {addr}: {source}")]
    Dial {
        /// Remote target address
        addr: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Postgres protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Error returned by the server for a statement
    #[error("sql error: {0}")]
    Sql(ErrorFields),

    /// Connection is already running a query
    #[error("connection busy: {0}")]
    ConnectionBusy(String),

    /// Connection was closed by the peer
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid connection state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl Error {
    /// SQLSTATE code of a server error, if this is one
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Sql(fields) => fields.code.as_deref(),
            _ => None,
        }
    }

    /// Whether the connection that produced this error can no longer be used
    ///
    /// Server-side statement errors leave the session usable; transport and
    /// protocol failures do not.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Dial { .. } | Error::ConnectionClosed | Error::Protocol(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
