//! Engine configuration

use std::time::Duration;

use vendora_settlement::RetryConfig;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Payouts above this many minor units require approval
    pub approval_threshold_minor: i64,
    /// Transfer retry policy
    pub retry: RetryConfig,
    /// Per-attempt transfer budget
    pub transfer_timeout: Duration,
    /// Cadence of the sweep scheduler; also the period each sweep covers
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_threshold_minor: 100_000,
            retry: RetryConfig::default(),
            transfer_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            approval_threshold_minor: env_parse(
                "VENDORA_APPROVAL_THRESHOLD_MINOR",
                defaults.approval_threshold_minor,
            ),
            retry: RetryConfig {
                max_attempts: env_parse(
                    "VENDORA_TRANSFER_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                ),
                base_delay: Duration::from_millis(env_parse(
                    "VENDORA_RETRY_BASE_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )),
                max_delay: Duration::from_millis(env_parse(
                    "VENDORA_RETRY_MAX_DELAY_MS",
                    defaults.retry.max_delay.as_millis() as u64,
                )),
            },
            transfer_timeout: Duration::from_secs(env_parse(
                "VENDORA_TRANSFER_TIMEOUT_SECS",
                defaults.transfer_timeout.as_secs(),
            )),
            sweep_interval: Duration::from_secs(env_parse(
                "VENDORA_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
