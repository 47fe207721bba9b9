use std::time::Duration;

/// Per-store timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Loads inside this window share one sort pass.
    pub sort_debounce: Duration,
    /// Refresh cadence for resources in a transitioning or error state.
    pub poll_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self { Self { sort_debounce: Duration::from_millis(10), poll_interval: Duration::from_secs(5) } }
}
