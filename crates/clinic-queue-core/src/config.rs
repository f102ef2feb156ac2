// Synchronizer configuration
//
// Loaded from environment variables with defaults.

use std::env;
use std::time::Duration;

const DEFAULT_NOTIFICATION_TTL_MS: u64 = 3000;
const DEFAULT_PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How long a notification stays visible before auto-dismissal
    pub notification_ttl: Duration,

    /// Capacity of the channel between a push connection and its view
    pub push_buffer: usize,
}

impl SyncConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `CLINIC_NOTIFICATION_TTL_MS`: notification display duration (default: 3000)
    /// - `CLINIC_PUSH_BUFFER`: buffered push events per view (default: 64)
    pub fn from_env() -> Self {
        let notification_ttl_ms = env::var("CLINIC_NOTIFICATION_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_NOTIFICATION_TTL_MS);

        let push_buffer = env::var("CLINIC_PUSH_BUFFER")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_PUSH_BUFFER);

        Self {
            notification_ttl: Duration::from_millis(notification_ttl_ms),
            push_buffer,
        }
    }

    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notification_ttl: Duration::from_millis(DEFAULT_NOTIFICATION_TTL_MS),
            push_buffer: DEFAULT_PUSH_BUFFER,
        }
    }
}
