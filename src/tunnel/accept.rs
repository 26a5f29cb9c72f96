//! Accept loop

use super::relay::relay;
use super::TargetDescriptor;
use crate::dialer::Dialer;
use crate::metrics::counters;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tracing::Instrument;

/// Accepts local connections and spawns one relay per connection
pub(crate) struct AcceptLoop {
    pub(crate) listener: TcpListener,
    pub(crate) target: Arc<TargetDescriptor>,
    pub(crate) dialer: Arc<dyn Dialer>,
    pub(crate) dial_timeout: Option<Duration>,
    pub(crate) max_connections: Option<usize>,
    pub(crate) nodelay: bool,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl AcceptLoop {
    /// Run until the shutdown signal fires, its sender is dropped, or accept fails
    ///
    /// The listener is dropped when this returns.
    pub(crate) async fn run(mut self) {
        let limit = self.max_connections.map(|n| Arc::new(Semaphore::new(n)));

        loop {
            // Wait for a relay slot before accepting so excess clients queue in the backlog
            let permit = match &limit {
                Some(sem) => tokio::select! {
                    _ = self.shutdown.changed() => {
                        tracing::debug!("tunnel closed, accept loop stopping");
                        break;
                    }
                    permit = Arc::clone(sem).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                },
                None => None,
            };

            let accepted = tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::debug!("tunnel closed, accept loop stopping");
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };

            let (socket, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed, tunnel stopped");
                    counters::tunnel_accept_error();
                    break;
                }
            };

            counters::tunnel_connection_accepted();
            tracing::debug!(%peer, "accepted connection");
            if self.nodelay {
                if let Err(e) = socket.set_nodelay(true) {
                    tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                }
            }

            let target = Arc::clone(&self.target);
            let dialer = Arc::clone(&self.dialer);
            let dial_timeout = self.dial_timeout;
            let span = tracing::debug_span!("relay", %peer, target = %target);
            tokio::spawn(
                async move {
                    relay(socket, peer, &target, dialer.as_ref(), dial_timeout).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }
    }
}
