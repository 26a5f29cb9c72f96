//! Authentication mechanisms for the bundled Postgres driver

mod scram;

pub use scram::{ScramClient, ScramError, ScramState};
