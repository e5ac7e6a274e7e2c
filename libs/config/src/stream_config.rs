//! Stream Client Configuration Module
//!
//! Provides configuration loading for output stream clients. Supports loading
//! from TOML files with environment-specific overrides and `STREAM_`-prefixed
//! environment variables (`STREAM_COORDINATOR_ADDRESS`,
//! `STREAM_RESOLVER__MAX_RETRIES`, ...).

use crate::constants::{self, resolver};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main stream client configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Logical address of the coordinator actor
    pub coordinator_address: String,

    /// Scheduling hint applied after every write
    pub write_yield: WriteYield,

    /// Coordinator resolution policy
    pub resolver: ResolverSettings,
}

/// Cooperative scheduling point taken after each write
///
/// Purely a fairness knob between many concurrently writing streams; it has no
/// effect on ordering.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WriteYield {
    /// Return immediately
    Disabled,
    /// `tokio::task::yield_now`
    YieldNow,
    /// Sleep for the given number of microseconds
    ///
    /// The tokio timer has millisecond resolution, so any non-zero value
    /// pauses for at least one millisecond.
    Sleep { micros: u64 },
}

/// Coordinator resolution and retry policy
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ResolverSettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_retry_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Re-resolve once when a cached coordinator handle turns out to be dead
    pub auto_reconnect: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            coordinator_address: constants::COORDINATOR_ADDRESS.to_string(),
            write_yield: WriteYield::default(),
            resolver: ResolverSettings::default(),
        }
    }
}

impl Default for WriteYield {
    fn default() -> Self {
        WriteYield::YieldNow
    }
}

impl WriteYield {
    /// Sleep duration, if this strategy sleeps
    pub fn sleep_duration(&self) -> Option<Duration> {
        match self {
            WriteYield::Sleep { micros } => Some(Duration::from_micros(*micros)),
            WriteYield::Disabled | WriteYield::YieldNow => None,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_retries: resolver::MAX_RETRIES,
            retry_delay_ms: resolver::RETRY_DELAY_MS,
            backoff_multiplier: resolver::BACKOFF_MULTIPLIER,
            max_retry_delay_ms: resolver::MAX_RETRY_DELAY_MS,
            connect_timeout_ms: resolver::CONNECT_TIMEOUT_MS,
            auto_reconnect: true,
        }
    }
}

impl ResolverSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl StreamConfig {
    /// Load configuration from files with environment overrides
    ///
    /// `environment` selects `<base dir>/environments/<environment>.toml`,
    /// which is layered on top of the base file when present.
    pub fn load(base_path: &Path, environment: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from(base_path).required(true));

        if let Some(env) = environment {
            let env_file = base_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (STREAM_ prefix)
        builder = builder.add_source(
            Environment::with_prefix(constants::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: StreamConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!(
            coordinator_address = %config.coordinator_address,
            "Loaded stream configuration from {:?}",
            base_path
        );
        config.validate()?;
        Ok(config)
    }

    /// Parse a literal TOML document; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StreamConfig =
            toml::from_str(source).context("Failed to parse stream configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<()> {
        if self.coordinator_address.trim().is_empty() {
            bail!("coordinator_address must not be empty");
        }
        if self.resolver.backoff_multiplier.is_nan() || self.resolver.backoff_multiplier < 1.0 {
            bail!(
                "resolver.backoff_multiplier must be >= 1.0, got {}",
                self.resolver.backoff_multiplier
            );
        }
        if self.resolver.connect_timeout_ms == 0 {
            bail!("resolver.connect_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    /// Expand `${VAR}` references in the coordinator address
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expanded = shellexpand::env(&self.coordinator_address)
            .context("Failed to expand coordinator address")?;
        self.coordinator_address = expanded.to_string();
        Ok(())
    }
}

/// Convenience function to load configuration and expand variables
pub fn load_config(base_path: &Path, environment: Option<&str>) -> Result<StreamConfig> {
    let mut config = StreamConfig::load(base_path, environment)?;
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.coordinator_address, "coordinator");
        assert_eq!(config.write_yield, WriteYield::YieldNow);
        assert_eq!(config.write_yield.sleep_duration(), None);
        assert_eq!(config.resolver.max_retries, 2);
        assert!(config.resolver.auto_reconnect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StreamConfig::from_toml_str(
            r#"
[resolver]
max_retries = 0
"#,
        )
        .unwrap();

        assert_eq!(config.resolver.max_retries, 0);
        assert_eq!(config.resolver.retry_delay_ms, 10);
        assert_eq!(config.coordinator_address, "coordinator");
    }

    #[test]
    fn test_write_yield_modes() {
        let config = StreamConfig::from_toml_str("[write_yield]\nmode = \"yield_now\"\n").unwrap();
        assert_eq!(config.write_yield, WriteYield::YieldNow);
        assert_eq!(config.write_yield.sleep_duration(), None);

        let config =
            StreamConfig::from_toml_str("[write_yield]\nmode = \"sleep\"\nmicros = 250\n").unwrap();
        assert_eq!(config.write_yield, WriteYield::Sleep { micros: 250 });
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        assert!(StreamConfig::from_toml_str("coordinator_address = \"  \"").is_err());
        assert!(StreamConfig::from_toml_str("[resolver]\nbackoff_multiplier = 0.5\n").is_err());
        assert!(StreamConfig::from_toml_str("[resolver]\nbackoff_multiplier = nan\n").is_err());
        assert!(StreamConfig::from_toml_str("[resolver]\nconnect_timeout_ms = 0\n").is_err());
    }

    #[test]
    fn test_load_base_and_environment_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("stream.toml");
        fs::write(
            &config_path,
            r#"
coordinator_address = "coordinator-main"

[resolver]
max_retries = 4
retry_delay_ms = 25
"#,
        )
        .unwrap();

        let env_dir = dir.path().join("environments");
        fs::create_dir(&env_dir).unwrap();
        fs::write(
            env_dir.join("staging.toml"),
            "[resolver]\nretry_delay_ms = 5\n",
        )
        .unwrap();

        let config = StreamConfig::load(&config_path, None).unwrap();
        assert_eq!(config.coordinator_address, "coordinator-main");
        assert_eq!(config.resolver.max_retries, 4);
        assert_eq!(config.resolver.retry_delay(), Duration::from_millis(25));

        let config = StreamConfig::load(&config_path, Some("staging")).unwrap();
        assert_eq!(config.resolver.max_retries, 4);
        assert_eq!(config.resolver.retry_delay(), Duration::from_millis(5));

        // Missing environment file is tolerated
        let config = StreamConfig::load(&config_path, Some("absent")).unwrap();
        assert_eq!(config.resolver.retry_delay_ms, 25);
    }

    #[test]
    fn test_missing_base_file_fails() {
        let dir = tempdir().unwrap();
        assert!(StreamConfig::load(&dir.path().join("nope.toml"), None).is_err());
    }

    #[test]
    fn test_expand_env_vars_in_address() {
        std::env::set_var("STITCH_TEST_REGION", "eu");
        let mut config =
            StreamConfig::from_toml_str("coordinator_address = \"coordinator-${STITCH_TEST_REGION}\"")
                .unwrap();
        config.expand_env_vars().unwrap();
        assert_eq!(config.coordinator_address, "coordinator-eu");
    }
}
