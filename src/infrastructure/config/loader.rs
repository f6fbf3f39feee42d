//! Hierarchical configuration loading: defaults -> YAML -> environment.

use super::settings::{EnvOverrides, Settings};
use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cache_dir must not be empty")]
    EmptyCacheDir,

    #[error("swap_cleanup_timeout_ms must be positive")]
    InvalidCleanupTimeout,

    #[error("swap_init_timeout_ms must be positive")]
    InvalidInitTimeout,

    #[error("swap_health_timeout_ms must be positive")]
    InvalidHealthTimeout,

    #[error("poll_interval_secs must be positive")]
    InvalidPollInterval,

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("database_path must not be empty")]
    EmptyDatabasePath,

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence, lowest to highest: programmatic defaults -> project
    /// config -> local overrides -> `FULCRUM_`-prefixed environment
    /// variables (double underscore for nesting).
    pub fn load() -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file("fulcrum.yaml"))
            .merge(Yaml::file("fulcrum.local.yaml"))
            .merge(Env::prefixed("FULCRUM_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        let mut settings = settings;
        EnvOverrides::from_env().apply(&mut settings);

        Self::validate(&settings)?;
        Ok(settings)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
        if settings.manifest.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCacheDir);
        }
        if settings.lifecycle.swap_cleanup_timeout_ms == 0 {
            return Err(ConfigError::InvalidCleanupTimeout);
        }
        if settings.lifecycle.swap_init_timeout_ms == 0 {
            return Err(ConfigError::InvalidInitTimeout);
        }
        if settings.lifecycle.swap_health_timeout_ms == 0 {
            return Err(ConfigError::InvalidHealthTimeout);
        }
        if settings.manifest.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&settings.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(settings.logging.level.clone()));
        }
        if settings.persistence.database_path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        ConfigLoader::validate(&settings).expect("defaults should validate");
    }

    #[test]
    fn rejects_empty_cache_dir() {
        let mut settings = Settings::default();
        settings.manifest.cache_dir = "".into();
        assert!(matches!(ConfigLoader::validate(&settings), Err(ConfigError::EmptyCacheDir)));
    }

    #[test]
    fn rejects_zero_cleanup_timeout() {
        let mut settings = Settings::default();
        settings.lifecycle.swap_cleanup_timeout_ms = 0;
        assert!(matches!(ConfigLoader::validate(&settings), Err(ConfigError::InvalidCleanupTimeout)));
    }

    #[test]
    fn rejects_zero_init_timeout() {
        let mut settings = Settings::default();
        settings.lifecycle.swap_init_timeout_ms = 0;
        assert!(matches!(ConfigLoader::validate(&settings), Err(ConfigError::InvalidInitTimeout)));
    }

    #[test]
    fn rejects_zero_health_timeout() {
        let mut settings = Settings::default();
        settings.lifecycle.swap_health_timeout_ms = 0;
        assert!(matches!(ConfigLoader::validate(&settings), Err(ConfigError::InvalidHealthTimeout)));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(matches!(ConfigLoader::validate(&settings), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "manifest:\n  poll_interval_secs: 60").unwrap();
        file.flush().unwrap();

        let settings = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(settings.manifest.poll_interval_secs, 60);
    }

    #[test]
    fn env_overrides_apply_after_figment_merge() {
        temp_env::with_var("CACHE_DIR", Some("/tmp/fulcrum-cache-test"), || {
            let overrides = EnvOverrides::from_env();
            let mut settings = Settings::default();
            overrides.apply(&mut settings);
            assert_eq!(settings.manifest.cache_dir, std::path::PathBuf::from("/tmp/fulcrum-cache-test"));
        });
    }
}
