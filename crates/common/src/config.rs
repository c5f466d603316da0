//! Probe tuning
//!
//! Defaults are the production values; `fast()` exists for local runs and
//! tests against loopback services.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifying user agent sent by every web probe.
pub const USER_AGENT: &str = "Vantage-Scanner/1.0";

/// Paths requested to provoke error pages.
pub const ERROR_PAGE_PATHS: [&str; 4] = ["/nonexistent", "/404", "/error", "/test"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub banner_timeout: Duration,
    /// Largest banner read, in bytes.
    pub banner_limit: usize,
    /// Lines of a response body kept as evidence.
    pub body_line_limit: usize,
    /// Bytes of a response body read before giving up on more lines.
    pub body_byte_limit: usize,
    pub user_agent: String,
    pub error_paths: Vec<String>,
    /// Probes of one plan in flight at once.
    pub max_concurrent_probes: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            banner_timeout: Duration::from_secs(3),
            banner_limit: 1024,
            body_line_limit: 100,
            body_byte_limit: 64 * 1024,
            user_agent: USER_AGENT.to_string(),
            error_paths: ERROR_PAGE_PATHS.iter().map(|p| p.to_string()).collect(),
            max_concurrent_probes: 16,
        }
    }
}

impl ProbeConfig {
    /// Short timeouts for loopback targets.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            ping_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
            banner_timeout: Duration::from_millis(300),
            ..Self::default()
        }
    }

    /// Wall-clock bound on one web request, body included.
    pub fn request_deadline(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }

    #[must_use]
    pub fn with_concurrency(mut self, probes: usize) -> Self {
        self.max_concurrent_probes = probes.max(1);
        self
    }

    #[must_use]
    pub fn with_user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.user_agent = ua.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_probe_contract() {
        let cfg = ProbeConfig::default();
        assert_eq!(cfg.ping_timeout, Duration::from_secs(3));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.banner_timeout, Duration::from_secs(3));
        assert_eq!(cfg.banner_limit, 1024);
        assert_eq!(cfg.error_paths, vec!["/nonexistent", "/404", "/error", "/test"]);
    }

    #[test]
    fn request_deadline_covers_connect_and_read() {
        assert_eq!(ProbeConfig::default().request_deadline(), Duration::from_secs(10));
        assert_eq!(ProbeConfig::fast().request_deadline(), Duration::from_secs(1));
        assert_eq!(ProbeConfig::default().body_byte_limit, 65536);
    }

    #[test]
    fn concurrency_never_zero() {
        assert_eq!(ProbeConfig::default().with_concurrency(0).max_concurrent_probes, 1);
    }
}
