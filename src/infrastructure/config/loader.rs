use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::{CLOTHING_SLOTS_PER_TYPE, Config, RetryConfig};

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid max_clothing_per_type: {0}. Must be between 1 and 100")]
    InvalidClothingCap(usize),

    #[error("Invalid resolution.{name}: must be at least 1 second")]
    InvalidResolutionWait { name: &'static str },

    #[error("Invalid poll_interval_ms: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Invalid retry_after_secs: {0}. Must be at least 1")]
    InvalidRetryAfter(u64),

    #[error("Invalid {name} retry policy: min_delay_secs ({min}) must be positive and not exceed max_delay_secs ({max})")]
    InvalidRetryDelays { name: &'static str, min: f64, max: f64 },

    #[error("Invalid {name} retry policy: backoff_factor ({factor}) must be at least 1.0")]
    InvalidBackoffFactor { name: &'static str, factor: f64 },

    #[error("Invalid capability URL for {name}: {url}")]
    InvalidCapabilityUrl { name: &'static str, url: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cofsync/config.yaml (project config)
    /// 3. .cofsync/local.yaml (local overrides, optional)
    /// 4. Environment variables (COFSYNC_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".cofsync/config.yaml"))
            .merge(Yaml::file(".cofsync/local.yaml"))
            .merge(Env::prefixed("COFSYNC_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("COFSYNC_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if !(1..=CLOTHING_SLOTS_PER_TYPE).contains(&config.outfit.max_clothing_per_type) {
            return Err(ConfigError::InvalidClothingCap(
                config.outfit.max_clothing_per_type,
            ));
        }

        if config.batch.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(config.batch.poll_interval_ms));
        }
        if config.batch.retry_after_secs == 0 {
            return Err(ConfigError::InvalidRetryAfter(config.batch.retry_after_secs));
        }

        Self::validate_retry("appearance", &config.server.appearance_retry)?;
        Self::validate_retry("increment", &config.server.increment_retry)?;

        let urls = [
            ("update_appearance_url", &config.server.update_appearance_url),
            ("increment_cof_version_url", &config.server.increment_cof_version_url),
        ];
        for (name, url) in urls {
            if let Some(url) = url {
                if reqwest::Url::parse(url).is_err() {
                    return Err(ConfigError::InvalidCapabilityUrl {
                        name,
                        url: url.clone(),
                    });
                }
            }
        }

        if config.resolution.max_wearable_wait_secs == 0 {
            return Err(ConfigError::InvalidResolutionWait {
                name: "max_wearable_wait_secs",
            });
        }
        if config.resolution.missing_wait_secs == 0 {
            return Err(ConfigError::InvalidResolutionWait {
                name: "missing_wait_secs",
            });
        }

        if config.server.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "server.request_timeout_secs cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_retry(name: &'static str, retry: &RetryConfig) -> Result<(), ConfigError> {
        if retry.min_delay_secs <= 0.0 || retry.min_delay_secs > retry.max_delay_secs {
            return Err(ConfigError::InvalidRetryDelays {
                name,
                min: retry.min_delay_secs,
                max: retry.max_delay_secs,
            });
        }
        if retry.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor {
                name,
                factor: retry.backoff_factor,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
logging:
  level: debug
  format: json
outfit:
  max_clothing_per_type: 3
server:
  update_appearance_url: https://sim.example/cap/update-appearance
  appearance_retry:
    min_delay_secs: 0.5
    max_delay_secs: 8.0
    backoff_factor: 2.0
    max_retries: 4
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.outfit.max_clothing_per_type, 3);
        assert_eq!(config.server.appearance_retry.max_retries, 4);
        assert_eq!(config.server.increment_retry.max_retries, 5);
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_validation_invalid_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validation_zero_clothing_cap() {
        let mut config = Config::default();
        config.outfit.max_clothing_per_type = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidClothingCap(0))
        );
    }

    #[test]
    fn test_validation_clothing_cap_bounded_by_tag_slots() {
        let mut config = Config::default();
        config.outfit.max_clothing_per_type = 100;
        assert_eq!(ConfigLoader::validate(&config), Ok(()));

        config.outfit.max_clothing_per_type = 101;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidClothingCap(101))
        );
    }

    #[test]
    fn test_validation_zero_resolution_waits() {
        let mut config = Config::default();
        config.resolution.max_wearable_wait_secs = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidResolutionWait {
                name: "max_wearable_wait_secs"
            })
        );

        let mut config = Config::default();
        config.resolution.missing_wait_secs = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidResolutionWait {
                name: "missing_wait_secs"
            })
        );

        // A zero late-arrival window only disables the late watch.
        let mut config = Config::default();
        config.resolution.late_arrival_window_secs = 0;
        assert_eq!(ConfigLoader::validate(&config), Ok(()));
    }

    #[test]
    fn test_validation_inverted_retry_delays() {
        let mut config = Config::default();
        config.server.increment_retry.min_delay_secs = 20.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRetryDelays { name: "increment", .. })
        ));
    }

    #[test]
    fn test_validation_bad_capability_url() {
        let mut config = Config::default();
        config.server.increment_cof_version_url = Some("not a url".to_string());
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidCapabilityUrl { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "batch:\n  max_retries: 6\nresolution:\n  prune_unresolved_links: false")
            .expect("write config");

        let config = ConfigLoader::load_from_file(file.path()).expect("config should load");
        assert_eq!(config.batch.max_retries, 6);
        assert!(!config.resolution.prune_unresolved_links);
        assert_eq!(config.batch.poll_interval_ms, 5000);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "outfit:\n  max_clothing_per_type: 2").expect("write config");

        temp_env::with_var("COFSYNC_OUTFIT__MAX_CLOTHING_PER_TYPE", Some("4"), || {
            let config = ConfigLoader::load_from_file(file.path()).expect("config should load");
            assert_eq!(config.outfit.max_clothing_per_type, 4);
        });
    }
}
