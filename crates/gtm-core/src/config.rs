//! Configuration types for GTM tooling
//!
//! This module defines the configuration structures shared by the library,
//! the HTTP services and the command line front end.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GtmConfig {
    /// Remote API access
    pub service: ServiceConfig,

    /// Optional propagation monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl GtmConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.service.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

/// Remote configuration and reporting API access
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the API host, e.g. `https://akab-xxxx.luna.akamaiapis.net`
    pub base_url: String,

    /// API access token
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Per-request HTTP timeout (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }

    /// Validate the service configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_url.is_empty() {
            return Err(crate::Error::config("API base URL cannot be empty"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "API base URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Propagation monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Delay between deployment status polls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Total time budget for waiting on propagation (in seconds)
    ///
    /// When the budget runs out the monitor stops with a timeout outcome;
    /// the remote change keeps propagating regardless.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MonitorConfig {
    pub fn new(poll_interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            poll_interval_secs,
            timeout_secs,
        }
    }

    /// Validate the monitor configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_http_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_defaults() {
        let config: MonitorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(MonitorConfig::new(0, 300).validate().is_err());
        assert!(MonitorConfig::new(5, 0).validate().is_ok());
    }

    #[test]
    fn test_service_validation() {
        assert!(ServiceConfig::new("", "token").validate().is_err());
        assert!(ServiceConfig::new("ftp://host", "token").validate().is_err());
        assert!(ServiceConfig::new("https://host", "").validate().is_err());
        assert!(ServiceConfig::new("https://host", "token").validate().is_ok());
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let config = ServiceConfig::new("https://host", "secret_token_12345");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("ServiceConfig"));
    }
}
