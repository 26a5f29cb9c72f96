//! Connection management
//!
//! This module handles:
//! * TCP transport
//! * Connection lifecycle (startup, auth, query execution)
//! * State machine enforcement
//! * The [`PgDriver`] adapter used by tunnel handles

mod conn;
mod pg_driver;
mod state;
mod transport;

pub use conn::{Connection, ConnectionConfig, ConnectionConfigBuilder};
pub use pg_driver::PgDriver;
pub use state::ConnectionState;
pub use transport::Transport;
