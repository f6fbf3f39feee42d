//! Typed configuration for every subsystem, loaded by `ConfigLoader`.

use crate::infrastructure::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
    #[serde(default)]
    pub manifest: ManifestSettings,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub persistence: PersistenceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry: RegistrySettings::default(),
            lifecycle: LifecycleSettings::default(),
            manifest: ManifestSettings::default(),
            watch: WatchSettings::default(),
            logging: LogConfig::default(),
            persistence: PersistenceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Module prefixes a factory may never resolve to.
    #[serde(default)]
    pub factory_blocklist: Vec<String>,
    /// When set, only these module prefixes may be resolved.
    #[serde(default)]
    pub factory_allowlist: Option<Vec<String>>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self { factory_blocklist: vec!["os".into(), "subprocess".into()], factory_allowlist: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    #[serde(default = "default_cleanup_timeout_ms")]
    pub swap_cleanup_timeout_ms: u64,
    /// Independent bound on `init()` during a swap, per §4.2 step 3.
    #[serde(default = "default_init_timeout_ms")]
    pub swap_init_timeout_ms: u64,
    /// Independent bound on `health()` during a swap, per §4.2 step 4.
    #[serde(default = "default_health_timeout_ms")]
    pub swap_health_timeout_ms: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            swap_cleanup_timeout_ms: default_cleanup_timeout_ms(),
            swap_init_timeout_ms: default_init_timeout_ms(),
            swap_health_timeout_ms: default_health_timeout_ms(),
        }
    }
}

fn default_cleanup_timeout_ms() -> u64 {
    5_000
}

fn default_init_timeout_ms() -> u64 {
    10_000
}

fn default_health_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSettings {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub trusted_signers: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_retry_max_elapsed_secs")]
    pub retry_max_elapsed_secs: u64,
    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,
    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: u32,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            trusted_signers: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            retry_max_elapsed_secs: default_retry_max_elapsed_secs(),
            circuit_breaker_enabled: true,
            circuit_failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".fulcrum/cache")
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_retry_max_elapsed_secs() -> u64 {
    15
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_override_file")]
    pub override_file: PathBuf,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub swap_queue_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            override_file: default_override_file(),
            debounce_ms: default_debounce_ms(),
            swap_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_override_file() -> PathBuf {
    PathBuf::from("fulcrum.overrides.yaml")
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    #[serde(default = "default_db_path")]
    pub database_path: String,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self { database_path: default_db_path() }
    }
}

fn default_db_path() -> String {
    ".fulcrum/activity.db".to_string()
}

/// Operational overrides read directly from the environment, per §6:
/// `STACK_ORDER`, `FACTORY_ALLOWLIST`, `CACHE_DIR`, `TRUSTED_SIGNERS`,
/// `SUPPRESS_EVENTS`. These are layered on top of the figment-merged
/// `Settings`, not sourced from a config file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub stack_order: Option<Vec<String>>,
    pub factory_allowlist: Option<Vec<String>>,
    pub cache_dir: Option<PathBuf>,
    pub trusted_signers: Option<Vec<String>>,
    pub suppress_events: bool,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let split_csv = |name: &str| -> Option<Vec<String>> {
            std::env::var(name).ok().map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        };

        Self {
            stack_order: split_csv("STACK_ORDER"),
            factory_allowlist: split_csv("FACTORY_ALLOWLIST"),
            cache_dir: std::env::var("CACHE_DIR").ok().map(PathBuf::from),
            trusted_signers: split_csv("TRUSTED_SIGNERS"),
            suppress_events: std::env::var("SUPPRESS_EVENTS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
        }
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(allowlist) = &self.factory_allowlist {
            settings.registry.factory_allowlist = Some(allowlist.clone());
        }
        if let Some(cache_dir) = &self.cache_dir {
            settings.manifest.cache_dir = cache_dir.clone();
        }
        if let Some(signers) = &self.trusted_signers {
            settings.manifest.trusted_signers = signers.clone();
        }
    }
}
