//! Opener without a tunnel

use super::{Connector, Database, Driver, Opener};
use crate::client::ConnectionUri;
use crate::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Opener that hands the driver the base URI unchanged apart from the
/// database name
///
/// Useful when the server is reachable without a jump host; callers written
/// against [`Opener`] work with either.
pub struct DirectOpener<D: Driver> {
    driver: Arc<D>,
    base: ConnectionUri,
}

impl<D: Driver> DirectOpener<D> {
    /// Create an opener for `base_uri`
    pub fn new(driver: D, base_uri: &str) -> Result<Self> {
        Ok(Self {
            driver: Arc::new(driver),
            base: ConnectionUri::parse(base_uri)?,
        })
    }

    /// Handle for the logical database `name`
    ///
    /// An empty name leaves the database to the driver's default.
    pub fn open(&self, name: &str) -> Result<Database<D>> {
        let connection_string = self.base.with_database(name).to_string();
        Ok(Database::new(
            name,
            Connector::new(Arc::clone(&self.driver), connection_string),
        ))
    }
}

impl<D: Driver> Opener for DirectOpener<D> {
    type Driver = D;

    fn open(&self, name: &str) -> Result<Database<D>> {
        DirectOpener::open(self, name)
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

impl<D: Driver> std::fmt::Debug for DirectOpener<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectOpener")
            .field("target", &self.base.authority())
            .finish()
    }
}
