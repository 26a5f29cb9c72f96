//! Metrics for the tunnel and the bundled driver
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.
//!
//! * `counters` - accepted connections, accept errors, dial failures, relay completions, auth outcomes
//! * `histograms` - dial latency and relayed bytes per direction
//! * `gauges` - relays currently in flight

pub mod counters;
pub mod gauges;
pub mod histograms;
pub mod labels;
