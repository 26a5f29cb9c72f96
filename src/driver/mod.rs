//! Driver shim
//!
//! The tunnel never speaks a database protocol itself. It hands a rewritten
//! connection string to a [`Driver`] and lets the driver do the rest; only
//! the TCP endpoint changes.
//!
//! * [`Driver`] / [`DriverConnection`] - capability traits, one impl per backing driver
//! * [`Connector`] - connection factory bound to one rewritten connection string
//! * [`Database`] - lazy handle returned by an [`Opener`]
//! * [`DirectOpener`] - [`Opener`] without a tunnel

mod database;
mod direct;

pub use database::{Connector, Database};
pub use direct::DirectOpener;

use crate::Result;
use futures::future::BoxFuture;

/// A database driver able to open connections from a connection string
pub trait Driver: Send + Sync + 'static {
    /// Connection type produced by this driver
    type Connection: DriverConnection;

    /// Open a connection
    fn open<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, Result<Self::Connection>>;
}

/// An open driver connection
pub trait DriverConnection: Send + 'static {
    /// Run one or more SQL statements
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ExecResult>>;

    /// Close the connection
    fn close(self) -> BoxFuture<'static, Result<()>>;

    /// Whether the connection can no longer be used
    fn is_broken(&self) -> bool;
}

/// Source of database handles
///
/// Implemented by [`TunnelOpener`](crate::TunnelOpener) and [`DirectOpener`].
pub trait Opener: Send + Sync {
    /// Driver backing the returned handles
    type Driver: Driver;

    /// Handle for the logical database `name`
    fn open(&self, name: &str) -> Result<Database<Self::Driver>>;

    /// Release the opener's resources
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Outcome of executing a batch of statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    command_tags: Vec<String>,
}

impl ExecResult {
    /// Result from the server's command tags, in statement order
    pub fn new(command_tags: Vec<String>) -> Self {
        Self { command_tags }
    }

    /// Command tags (`CREATE DATABASE`, `INSERT 0 3`, ...)
    pub fn command_tags(&self) -> &[String] {
        &self.command_tags
    }

    /// Rows affected by the last statement, when its tag carries a count
    pub fn rows_affected(&self) -> Option<u64> {
        let tag = self.command_tags.last()?;
        let mut words = tag.split_whitespace();
        let verb = words.next()?;
        match verb {
            "INSERT" | "UPDATE" | "DELETE" | "SELECT" | "MOVE" | "FETCH" | "COPY" | "MERGE" => {
                words.last()?.parse().ok()
            }
            _ => None,
        }
    }
}
