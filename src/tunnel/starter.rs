//! One-shot start gate

use std::sync::Once;

/// Runs a start action at most once
///
/// The first caller runs the action; concurrent callers wait for it to
/// return, later callers return immediately.
#[derive(Debug)]
pub struct LazyStarter {
    once: Once,
}

impl LazyStarter {
    /// New gate that has not fired
    pub const fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Run `action` if no caller has yet
    pub fn start<F: FnOnce()>(&self, action: F) {
        self.once.call_once(action);
    }

    /// Whether the gate has fired
    pub fn has_started(&self) -> bool {
        self.once.is_completed()
    }
}

impl Default for LazyStarter {
    fn default() -> Self {
        Self::new()
    }
}
