//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `THREADLINE_API_URL` - Base URL of the Threadline backend
//!
//! ## Optional
//! - `THREADLINE_TIMEOUT_SECS` - Per-request timeout in seconds (default: 10)

use std::time::Duration;

use thiserror::Error;

/// Default per-request timeout. A timed-out request surfaces as a network
/// failure and does not participate in the refresh-queue protocol.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Fixed timeout applied to every request.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `THREADLINE_API_URL` is missing or
    /// `THREADLINE_TIMEOUT_SECS` is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("THREADLINE_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("THREADLINE_API_URL".to_string()))?;

        let mut config = Self::new(base_url);

        if let Ok(raw) = std::env::var("THREADLINE_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidEnvVar(
                    "THREADLINE_TIMEOUT_SECS".to_string(),
                    format!("expected a positive integer, got {raw:?}"),
                )
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidEnvVar(
                    "THREADLINE_TIMEOUT_SECS".to_string(),
                    "timeout must be at least 1 second".to_string(),
                ));
            }
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
