use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FINALIZE_DELAY_MS: u64 = 500;

/// Settings shared by page loading and scan sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub timeout_secs: u64,
    /// Pause before the final result is computed, lets late responses settle.
    pub finalize_delay_ms: u64,
    pub user_agent: String,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            finalize_delay_ms: DEFAULT_FINALIZE_DELAY_MS,
            user_agent: format!("Routefinder/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_finalize_delay(mut self, delay: Duration) -> Self {
        self.finalize_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn finalize_delay(&self) -> Duration {
        Duration::from_millis(self.finalize_delay_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}
