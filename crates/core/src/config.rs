use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global application configuration, built once at start-up and handed to
/// each adapter's constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub upstream: UpstreamConfig,
    pub sync: SyncConfig,
    pub schedule: ScheduleConfig,
    pub log: LogConfig,
}

/// Downstream REST API (login, watermark, owners, persistence sink).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

/// Upstream market-data API (Energi Data Service price list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    // page size for owner tariff queries
    pub page_limit: u32,
    // page size for the national system tariff query
    pub system_page_limit: u32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

/// Which jobs a sync pass runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub charges: bool,
    pub system_tariffs: bool,
    // pause after each charge insert, eases load on the store
    pub insert_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    // None runs a single pass and exits
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub filter: String,
    // daily rolling log files are written here when set
    pub dir: Option<String>,
}

/// # Summary
/// Bounded exponential backoff for upstream calls.
///
/// # Invariants
/// - `max_attempts` counts the first try; `0` is treated as `1`.
/// - Delays never exceed `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Policy with no waiting between attempts, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_factor: 1.0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// # Summary
    /// Delay to wait before retry number `retry` (0 = the first retry).
    ///
    /// # Logic
    /// 1. Start at `initial_delay_ms`.
    /// 2. Multiply by `backoff_factor` once per earlier retry, clamping to
    ///    `max_delay_ms` at every step so the value cannot overflow.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };

        let mut delay = Duration::from_millis(self.initial_delay_ms).min(max);
        for _ in 0..retry {
            if delay >= max {
                break;
            }
            delay = Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
                .unwrap_or(max)
                .min(max);
        }
        delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 10_000,
            max_delay_ms: 3_600_000,
            backoff_factor: 1.5,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: String::new(),
                username: String::new(),
                password: String::new(),
                timeout_secs: 30,
            },
            upstream: UpstreamConfig {
                base_url: "https://api.energidataservice.dk/dataset/DatahubPricelist".to_string(),
                page_limit: 2500,
                system_page_limit: 500,
                timeout_secs: 30,
                retry: RetryPolicy::default(),
            },
            sync: SyncConfig {
                charges: true,
                system_tariffs: true,
                insert_delay_ms: 500,
            },
            schedule: ScheduleConfig {
                interval_secs: None,
            },
            log: LogConfig {
                filter: "info".to_string(),
                dir: None,
            },
        }
    }
}
