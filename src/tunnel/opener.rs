//! Tunnel opener

use super::accept::AcceptLoop;
use super::{LazyStarter, TargetDescriptor, TunnelConfig};
use crate::client::ConnectionUri;
use crate::dialer::Dialer;
use crate::driver::{Connector, Database, Driver, Opener};
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Opens database handles that reach the server through a dialer
///
/// Construction binds a loopback listener. The first [`open`](Self::open) or
/// [`close`](Self::close) starts the accept loop; every handle's connection
/// string points at the listener, and each connection the driver makes there
/// is relayed to the real server through the dialer.
///
/// Dropping the opener stops the accept loop like `close` does.
pub struct TunnelOpener<D: Driver> {
    driver: Arc<D>,
    dialer: Arc<dyn Dialer>,
    base: ConnectionUri,
    target: Arc<TargetDescriptor>,
    config: TunnelConfig,
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    starter: LazyStarter,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl<D: Driver> TunnelOpener<D> {
    /// Create an opener with the default [`TunnelConfig`]
    ///
    /// Must be called within a Tokio runtime; the accept loop is spawned on it.
    pub async fn new(dialer: Arc<dyn Dialer>, driver: D, base_uri: &str) -> Result<Self> {
        Self::with_config(dialer, driver, base_uri, TunnelConfig::default()).await
    }

    /// Create an opener with an explicit configuration
    pub async fn with_config(
        dialer: Arc<dyn Dialer>,
        driver: D,
        base_uri: &str,
        config: TunnelConfig,
    ) -> Result<Self> {
        let base = ConnectionUri::parse(base_uri)?;
        let target = Arc::new(TargetDescriptor::from_uri(&base));

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.bind_addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: config.bind_addr.to_string(),
            source,
        })?;

        tracing::debug!(local = %local_addr, %target, "tunnel listener bound");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            driver: Arc::new(driver),
            dialer,
            base,
            target,
            config,
            local_addr,
            listener: Mutex::new(Some(listener)),
            starter: LazyStarter::new(),
            shutdown,
            accept_task: Mutex::new(None),
            runtime: Handle::current(),
        })
    }

    /// Handle for the logical database `name`
    ///
    /// The handle connects lazily, so an unreachable server is reported by
    /// its first operation rather than here. An empty name leaves the
    /// database to the driver's default.
    pub fn open(&self, name: &str) -> Result<Database<D>> {
        self.ensure_started();

        let connection_string = self
            .base
            .with_addr(self.local_addr)
            .with_database(name)
            .to_string();
        Ok(Database::new(
            name,
            Connector::new(Arc::clone(&self.driver), connection_string),
        ))
    }

    /// Stop accepting connections and release the listener
    ///
    /// Relays already running are left to finish on their own. Calling
    /// `close` again is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.ensure_started();
        self.shutdown.send_replace(true);

        let task = lock(&self.accept_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "accept loop ended abnormally");
            }
            tracing::info!(local = %self.local_addr, "tunnel closed");
        }
        Ok(())
    }

    /// Address of the local listener
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Real server the tunnel reaches
    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    /// Whether the accept loop has been started
    pub fn is_started(&self) -> bool {
        self.starter.has_started()
    }

    fn ensure_started(&self) {
        self.starter.start(|| {
            let Some(listener) = lock(&self.listener).take() else {
                return;
            };

            let accept = AcceptLoop {
                listener,
                target: Arc::clone(&self.target),
                dialer: Arc::clone(&self.dialer),
                dial_timeout: self.config.dial_timeout,
                max_connections: self.config.max_connections,
                nodelay: self.config.nodelay,
                shutdown: self.shutdown.subscribe(),
            };
            let span = tracing::info_span!("tunnel", local = %self.local_addr, target = %self.target);
            let task = self.runtime.spawn(accept.run().instrument(span));
            *lock(&self.accept_task) = Some(task);

            tracing::info!(local = %self.local_addr, target = %self.target, "tunnel started");
        });
    }
}

impl<D: Driver> Opener for TunnelOpener<D> {
    type Driver = D;

    fn open(&self, name: &str) -> Result<Database<D>> {
        TunnelOpener::open(self, name)
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(TunnelOpener::close(self))
    }
}

impl<D: Driver> std::fmt::Debug for TunnelOpener<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelOpener")
            .field("local_addr", &self.local_addr)
            .field("target", &self.target)
            .field("started", &self.is_started())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
