//! # Stream Configuration
//!
//! Resolves the WebSocket base address and the reconnect behaviour.
//!
//! The base address is taken, in order, from:
//! 1. an explicit value (CLI flag)
//! 2. `HAIFU_WS_BASE_URL`
//! 3. `HAIFU_API_BASE_URL` with its `http` scheme rewritten to `ws`
//! 4. [`DEFAULT_WS_BASE_URL`]

use std::env;
use std::time::Duration;

/// Base address used when nothing else is configured.
pub const DEFAULT_WS_BASE_URL: &str = "ws://localhost:8000";

pub const WS_BASE_URL_ENV: &str = "HAIFU_WS_BASE_URL";
pub const API_BASE_URL_ENV: &str = "HAIFU_API_BASE_URL";

/// Delay before the first reconnect attempt; doubles on every attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Consecutive reconnect attempts before the client gives up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Upper bound on a single handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Reconnect Policy ───────────────────────────────────────────

/// Exponential backoff: attempt `n` (1-based) waits `base_delay × 2^(n−1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt`, counted from 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

// ─── Stream Config ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// e.g. `ws://localhost:8000` or `wss://api.example.com`
    pub ws_base_url: String,
    pub reconnect: ReconnectPolicy,
    /// `None` leaves handshake timing entirely to the transport.
    pub connect_timeout: Option<Duration>,
}

impl StreamConfig {
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Reads the base address from the process environment.
    pub fn from_env() -> Self {
        Self::resolve(
            None,
            env::var(WS_BASE_URL_ENV).ok(),
            env::var(API_BASE_URL_ENV).ok(),
        )
    }

    /// Picks the first non-empty source. Kept free of environment access so
    /// the precedence can be tested directly.
    pub fn resolve(
        explicit: Option<String>,
        ws_base_url: Option<String>,
        api_base_url: Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let base = non_empty(explicit)
            .or_else(|| non_empty(ws_base_url))
            .or_else(|| non_empty(api_base_url).map(|api| api.replacen("http", "ws", 1)))
            .unwrap_or_else(|| DEFAULT_WS_BASE_URL.to_string());

        Self::new(base)
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WS_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn explicit_url_wins() {
        let config = StreamConfig::resolve(
            Some("ws://flag:1".into()),
            Some("ws://env:2".into()),
            Some("http://api:3".into()),
        );
        assert_eq!(config.ws_base_url, "ws://flag:1");
    }

    #[test]
    fn api_url_is_rewritten_to_websocket_scheme() {
        let config = StreamConfig::resolve(None, None, Some("https://api.haifu.dev".into()));
        assert_eq!(config.ws_base_url, "wss://api.haifu.dev");

        let config = StreamConfig::resolve(None, Some(String::new()), Some("http://api:3".into()));
        assert_eq!(config.ws_base_url, "ws://api:3");
    }

    #[test]
    fn falls_back_to_localhost() {
        let config = StreamConfig::resolve(None, None, None);
        assert_eq!(config.ws_base_url, DEFAULT_WS_BASE_URL);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
    }
}
