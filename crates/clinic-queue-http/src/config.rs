// Transport configuration
//
// Loaded from environment variables with defaults.

use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_PUSH_PATH: &str = "/api/events";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Backend base URL, without a trailing slash
    pub base_url: String,

    /// Path of the Server-Sent Events endpoint
    pub push_path: String,

    /// Per-request timeout for REST calls; connect timeout for push streams
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize(base_url.into()),
            push_path: DEFAULT_PUSH_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `CLINIC_API_URL`: backend base URL (default: http://localhost:5000)
    /// - `CLINIC_PUSH_PATH`: push stream path (default: /api/events)
    /// - `CLINIC_HTTP_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let base_url = env::var("CLINIC_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let push_path = env::var("CLINIC_PUSH_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUSH_PATH.to_string());

        let timeout_secs = env::var("CLINIC_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &u64| *n > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url: normalize(base_url),
            push_path,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize(base_url.into());
        self
    }

    pub fn with_push_path(mut self, push_path: impl Into<String>) -> Self {
        self.push_path = push_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn push_url(&self) -> String {
        if self.push_path.starts_with('/') {
            self.url(&self.push_path)
        } else {
            format!("{}/{}", self.base_url, self.push_path)
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

fn normalize(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.push_url(), "http://localhost:5000/api/events");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_trailing_slash_and_relative_push_path() {
        let config = ApiConfig::new("https://clinic.example/").with_push_path("stream");
        assert_eq!(config.url("/api/tokens"), "https://clinic.example/api/tokens");
        assert_eq!(config.push_url(), "https://clinic.example/stream");
    }
}
