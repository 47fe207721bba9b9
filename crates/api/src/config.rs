use std::time::Duration;

use steve_socket::SocketConfig;
use steve_store::StoreConfig;

/// Connection-wide settings. `from_env` overrides the defaults with `STEVE_*`
/// variables; unparsable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Base for relative request paths.
    pub base_url: String,
    pub socket_url: String,
    /// Restrict namespaced watches to this namespace.
    pub namespace: Option<String>,
    /// Sent as `x-api-csrf` on every request.
    pub csrf: Option<String>,
    pub flush_interval: Duration,
    /// Delay before re-watching after a stop we did not ask for.
    pub rewatch_delay: Duration,
    pub queue_cap: usize,
    pub frame_timeout: Duration,
    pub max_backoff: Duration,
    pub poll_interval: Duration,
    pub sort_debounce: Duration,
}

pub const DEFAULT_BASE_URL: &str = "https://localhost/v1";

fn socket_url_for(base: &str) -> String { format!("{}/subscribe", base.trim_end_matches('/')) }

impl Default for ConnectionConfig {
    fn default() -> Self { Self::new(DEFAULT_BASE_URL) }
}

impl ConnectionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            socket_url: socket_url_for(&base_url),
            base_url,
            namespace: None,
            csrf: None,
            flush_interval: Duration::from_millis(1000),
            rewatch_delay: Duration::from_secs(5),
            queue_cap: 4096,
            frame_timeout: Duration::from_secs(32),
            max_backoff: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            sort_debounce: Duration::from_millis(10),
        }
    }

    pub fn from_env() -> Self {
        fn var(k: &str) -> Option<String> { std::env::var(k).ok().filter(|v| !v.trim().is_empty()) }
        fn num(k: &str) -> Option<u64> { var(k).and_then(|v| v.trim().parse().ok()) }

        let d = Self::new(var("STEVE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()));
        Self {
            socket_url: var("STEVE_SOCKET_URL").unwrap_or_else(|| d.socket_url.clone()),
            namespace: var("STEVE_NAMESPACE"),
            csrf: var("STEVE_CSRF"),
            flush_interval: num("STEVE_FLUSH_MS").map(Duration::from_millis).unwrap_or(d.flush_interval),
            rewatch_delay: num("STEVE_REWATCH_SECS").map(Duration::from_secs).unwrap_or(d.rewatch_delay),
            queue_cap: num("STEVE_QUEUE_CAP").map(|n| n as usize).unwrap_or(d.queue_cap),
            frame_timeout: num("STEVE_FRAME_TIMEOUT_SECS").map(Duration::from_secs).unwrap_or(d.frame_timeout),
            max_backoff: num("STEVE_BACKOFF_MAX_SECS").map(Duration::from_secs).unwrap_or(d.max_backoff),
            poll_interval: num("STEVE_POLL_SECS").map(Duration::from_secs).unwrap_or(d.poll_interval),
            sort_debounce: num("STEVE_SORT_DEBOUNCE_MS").map(Duration::from_millis).unwrap_or(d.sort_debounce),
            ..d
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self { self.namespace = Some(ns.into()); self }

    pub fn socket_config(&self) -> SocketConfig {
        let mut cfg = SocketConfig::new(self.socket_url.clone());
        cfg.frame_timeout = self.frame_timeout;
        cfg.max_backoff = self.max_backoff;
        cfg.secure = !self.base_url.starts_with("http://");
        cfg
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig { sort_debounce: self.sort_debounce, poll_interval: self.poll_interval }
    }
}
