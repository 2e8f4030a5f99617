use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::errors::ExperimentError;
use crate::domain::models::config::BenchConfig;
use crate::domain::models::PortBlock;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid sweep: {0}")]
    InvalidSweep(#[from] ExperimentError),

    #[error("Port block starting at {base_port} cannot hold {members} members")]
    PortOverflow { base_port: u16, members: u16 },

    #[error("Invalid {0}: must be at least 1")]
    ZeroWorkers(&'static str),

    #[error("Invalid poll_interval_ms: must be positive")]
    ZeroPollInterval,

    #[error("Invalid timeout_secs ({timeout_secs}s): shorter than poll interval ({poll_interval_ms}ms)")]
    TimeoutShorterThanPoll {
        timeout_secs: u64,
        poll_interval_ms: u64,
    },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Environment variable prefix for overrides, e.g. `SWIMBENCH_COLLECT__TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "SWIMBENCH_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized), which reproduce the reference campaign
    /// 2. The YAML file passed with `--config`, if any
    /// 3. Environment variables (SWIMBENCH_* prefix, `__` separates nesting)
    pub fn load(config_file: Option<&Path>) -> Result<BenchConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(BenchConfig::default()));

        if let Some(path) = config_file {
            if !path.is_file() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let config: BenchConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &BenchConfig) -> Result<(), ConfigError> {
        let sweep = config.sweep.to_sweep()?;

        let max_members = sweep.max_members();
        if PortBlock::new(config.fleet.base_port, max_members).is_none() {
            return Err(ConfigError::PortOverflow {
                base_port: config.fleet.base_port,
                members: max_members,
            });
        }

        if config.fleet.spawn_workers == 0 {
            return Err(ConfigError::ZeroWorkers("spawn_workers"));
        }
        if config.fleet.teardown_workers == 0 {
            return Err(ConfigError::ZeroWorkers("teardown_workers"));
        }
        if config.collect.lookup_workers == 0 {
            return Err(ConfigError::ZeroWorkers("lookup_workers"));
        }

        if config.collect.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if config.collect.timeout_secs.saturating_mul(1000) < config.collect.poll_interval_ms {
            return Err(ConfigError::TimeoutShorterThanPoll {
                timeout_secs: config.collect.timeout_secs,
                poll_interval_ms: config.collect.poll_interval_ms,
            });
        }

        for (name, value) in [
            ("fleet.image", &config.fleet.image),
            ("fleet.binary", &config.fleet.binary),
            ("build.image", &config.build.image),
            ("build.script", &config.build.script),
            ("store.image", &config.store.image),
            ("store.url", &config.store.url),
            ("store.key_prefix", &config.store.key_prefix),
            ("runtime.docker_path", &config.runtime.docker_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }
        if config.build.shell.is_empty() {
            return Err(ConfigError::Empty("build.shell"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
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

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = BenchConfig::default();
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        temp_env::with_vars_unset(
            ["SWIMBENCH_COLLECT__TIMEOUT_SECS", "SWIMBENCH_FLEET__BASE_PORT"],
            || {
                let config = ConfigLoader::load(None).expect("defaults should load");
                assert_eq!(config, BenchConfig::default());
            },
        );
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "sweep:\n  members: [8]\n  members_in_update: [3]\n  fanout: [2]\n  iterations: 1\nfleet:\n  base_port: 9000"
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).expect("file should load");
        assert_eq!(config.sweep.members, vec![8]);
        assert_eq!(config.sweep.iterations, 1);
        assert_eq!(config.fleet.base_port, 9000);
        assert_eq!(config.fleet.image, "microswim");
    }

    #[test]
    fn test_env_overrides_defaults() {
        temp_env::with_var("SWIMBENCH_COLLECT__TIMEOUT_SECS", Some("60"), || {
            let config = ConfigLoader::load(None).expect("env should load");
            assert_eq!(config.collect.timeout_secs, 60);
        });
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(ConfigLoader::load(Some(Path::new("/nonexistent/swimbench.yaml"))).is_err());
    }

    #[test]
    fn test_validate_update_exceeding_members() {
        let mut config = BenchConfig::default();
        config.sweep.members = vec![2, 8];
        config.sweep.members_in_update = vec![3];

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSweep(ExperimentError::UpdateExceedsMembers { .. }))
        ));
    }

    #[test]
    fn test_validate_port_overflow() {
        let mut config = BenchConfig::default();
        config.fleet.base_port = 65_500;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::PortOverflow { members: 128, .. })
        ));
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = BenchConfig::default();
        config.collect.lookup_workers = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroWorkers("lookup_workers"))
        ));
    }

    #[test]
    fn test_validate_timeout_shorter_than_poll() {
        let mut config = BenchConfig::default();
        config.collect.timeout_secs = 1;
        config.collect.poll_interval_ms = 5000;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::TimeoutShorterThanPoll { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_unbounded_timeout() {
        let mut config = BenchConfig::default();
        config.collect.timeout_secs = u64::MAX;

        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = BenchConfig::default();
        config.logging.level = "verbose".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_validate_empty_image() {
        let mut config = BenchConfig::default();
        config.fleet.image = "  ".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::Empty("fleet.image"))
        ));
    }
}
