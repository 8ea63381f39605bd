//! Session runtime configuration.
//!
//! - **Default sentinel**: `"default"` (configurable via `PROVISION_DEFAULT_SENTINEL`)
//! - **Fetch timeout**: 30 seconds per inventory call (configurable via
//!   `PROVISION_FETCH_TIMEOUT_SECS`)
//! - **Retry**: [`RetryConfig::DEFAULT`] for transient inventory failures

use std::time::Duration;

use crate::cascade::DEFAULT_SENTINEL;
use crate::inventory::RetryConfig;

/// Default timeout for one inventory call (30 seconds).
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default per-instance worker mailbox size.
const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Default capacity of the session event broadcast.
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Configuration for a [`Session`](super::Session).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Trigger value meaning "use the provider default". A trigger holding it
    /// clears its dependents without fetching.
    pub default_sentinel: String,

    /// Time allowed for a single inventory call before it counts as a
    /// transient failure.
    pub fetch_timeout: Duration,

    /// Backoff for transient failures within one dispatched fetch.
    pub retry: RetryConfig,

    /// Capacity of each instance worker's message channel.
    pub channel_buffer: usize,

    /// Capacity of the [`SessionEvent`](super::SessionEvent) broadcast.
    /// Slow subscribers lag rather than block workers.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        SessionConfig {
            default_sentinel: DEFAULT_SENTINEL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            retry: RetryConfig::DEFAULT,
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Creates a `SessionConfig` from environment variables.
    ///
    /// Reads `PROVISION_DEFAULT_SENTINEL` and `PROVISION_FETCH_TIMEOUT_SECS`.
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let default_sentinel = std::env::var("PROVISION_DEFAULT_SENTINEL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SENTINEL.to_string());

        let timeout_secs = std::env::var("PROVISION_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        SessionConfig {
            default_sentinel,
            fetch_timeout: Duration::from_secs(timeout_secs),
            ..Self::new()
        }
    }

    pub fn with_default_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.default_sentinel = sentinel.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_channel_buffer(mut self, size: usize) -> Self {
        self.channel_buffer = size.max(1);
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }
}
