use serde::{Deserialize, Serialize};

use super::wearable::WearableType;

/// Main configuration structure for cofsync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Outfit composition rules
    #[serde(default)]
    pub outfit: OutfitConfig,

    /// Bulk copy/link batch behaviour
    #[serde(default)]
    pub batch: BatchConfig,

    /// Wearable resolution timeouts
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Appearance server capabilities and retry policies
    #[serde(default)]
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation for file logs: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Outfit composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutfitConfig {
    /// Maximum number of COF links per clothing type
    #[serde(default = "default_max_clothing_per_type")]
    pub max_clothing_per_type: usize,

    /// Types replaced with a default wearable when requested but unloadable
    #[serde(default = "default_recoverable_types")]
    pub recoverable_types: Vec<WearableType>,
}

/// Ordering tags reserve this many slots per wearable type.
pub const CLOTHING_SLOTS_PER_TYPE: usize = 100;

const fn default_max_clothing_per_type() -> usize {
    5
}

fn default_recoverable_types() -> Vec<WearableType> {
    vec![WearableType::Shirt, WearableType::Pants, WearableType::Skirt]
}

impl Default for OutfitConfig {
    fn default() -> Self {
        Self {
            max_clothing_per_type: default_max_clothing_per_type(),
            recoverable_types: default_recoverable_types(),
        }
    }
}

/// Batch operation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Seconds to wait for a reply before re-issuing a request
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,

    /// Re-issues allowed per item before it is marked failed
    #[serde(default = "default_batch_max_retries")]
    pub max_retries: u32,

    /// Interval between wait-set sweeps in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long late replies are drained after the batch settles
    #[serde(default = "default_drain_grace_secs")]
    pub drain_grace_secs: u64,
}

const fn default_retry_after_secs() -> u64 {
    300
}

const fn default_batch_max_retries() -> u32 {
    2
}

const fn default_poll_interval_ms() -> u64 {
    5000
}

const fn default_drain_grace_secs() -> u64 {
    30
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: default_retry_after_secs(),
            max_retries: default_batch_max_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            drain_grace_secs: default_drain_grace_secs(),
        }
    }
}

/// Wearable resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResolutionConfig {
    /// Upper bound on waiting for wearable assets
    #[serde(default = "default_max_wearable_wait_secs")]
    pub max_wearable_wait_secs: u64,

    /// Upper bound on recovering missing required wearables
    #[serde(default = "default_missing_wait_secs")]
    pub missing_wait_secs: u64,

    /// How long assets arriving after completion are still applied
    #[serde(default = "default_late_arrival_window_secs")]
    pub late_arrival_window_secs: u64,

    /// Remove COF links whose wearable could not be loaded
    #[serde(default = "default_prune_unresolved_links")]
    pub prune_unresolved_links: bool,
}

const fn default_max_wearable_wait_secs() -> u64 {
    60
}

const fn default_missing_wait_secs() -> u64 {
    60
}

const fn default_late_arrival_window_secs() -> u64 {
    120
}

const fn default_prune_unresolved_links() -> bool {
    true
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_wearable_wait_secs: default_max_wearable_wait_secs(),
            missing_wait_secs: default_missing_wait_secs(),
            late_arrival_window_secs: default_late_arrival_window_secs(),
            prune_unresolved_links: default_prune_unresolved_links(),
        }
    }
}

/// Appearance server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// UpdateAvatarAppearance capability URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_appearance_url: Option<String>,

    /// IncrementCOFVersion capability URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_cof_version_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry policy for appearance update requests
    #[serde(default = "default_appearance_retry")]
    pub appearance_retry: RetryConfig,

    /// Retry policy for COF version increments
    #[serde(default = "default_increment_retry")]
    pub increment_retry: RetryConfig,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_appearance_retry() -> RetryConfig {
    RetryConfig {
        min_delay_secs: 1.0,
        max_delay_secs: 32.0,
        backoff_factor: 2.0,
        max_retries: 10,
    }
}

const fn default_increment_retry() -> RetryConfig {
    RetryConfig {
        min_delay_secs: 1.0,
        max_delay_secs: 16.0,
        backoff_factor: 2.0,
        max_retries: 5,
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            update_appearance_url: None,
            increment_cof_version_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            appearance_retry: default_appearance_retry(),
            increment_retry: default_increment_retry(),
        }
    }
}

/// Adaptive retry policy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// First (and minimum) delay in seconds
    pub min_delay_secs: f64,

    /// Ceiling on the delay in seconds
    pub max_delay_secs: f64,

    /// Multiplier applied after each attempt
    pub backoff_factor: f64,

    /// Retries allowed before giving up
    pub max_retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.outfit.max_clothing_per_type, 5);
        assert_eq!(config.batch.retry_after_secs, 300);
        assert_eq!(config.batch.poll_interval_ms, 5000);
        assert_eq!(config.resolution.max_wearable_wait_secs, 60);
        assert_eq!(config.server.appearance_retry.max_retries, 10);
        assert_eq!(config.server.increment_retry.max_delay_secs, 16.0);
        assert!(config.server.update_appearance_url.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "outfit:\n  recoverable_types: [shirt]\nbatch:\n  max_retries: 4\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.outfit.recoverable_types, vec![WearableType::Shirt]);
        assert_eq!(config.outfit.max_clothing_per_type, 5);
        assert_eq!(config.batch.max_retries, 4);
        assert_eq!(config.batch.retry_after_secs, 300);
    }
}
