//! Loopback tunnel
//!
//! * `opener` - [`TunnelOpener`], the public entry point
//! * `starter` - [`LazyStarter`], starts the accept loop once
//! * `accept` - accept loop over the local listener
//! * `relay` - dial the target and copy bytes both ways
//! * `config` - [`TunnelConfig`] and its builder
//! * `target` - [`TargetDescriptor`], the real server address

mod accept;
mod config;
mod opener;
mod relay;
mod starter;
mod target;

pub use config::{TunnelConfig, TunnelConfigBuilder};
pub use opener::TunnelOpener;
pub use starter::LazyStarter;
pub use target::TargetDescriptor;
