//! Configuration management for Vantage.
//!
//! The application configuration lives in one TOML file that is created with
//! defaults the first time the process starts. Per-extension enable switches are
//! kept in a separate file, see [`vantage_extensions::FileExtensionSettings`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use vantage_extension_api::ServerUuid;

fn default_server_name() -> String {
    "Server".to_string()
}

fn default_database_path() -> String {
    "vantage.db".to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_periodic_interval() -> u64 {
    300
}

fn default_settings_file() -> String {
    "extensions.toml".to_string()
}

fn default_idle_expiry() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub gathering: GatheringSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Identity of the server whose data is gathered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Generated once and written to the file with the defaults
    #[serde(default)]
    pub uuid: ServerUuid,
    #[serde(default = "default_server_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Worker pool and periodic gathering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatheringSettings {
    /// Most gathers running at the same time
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds between periodic server gathers, 0 to disable
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,
    /// TOML file with one enable switch per extension
    #[serde(default = "default_settings_file")]
    pub settings_file: String,
}

impl Default for GatheringSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            periodic_interval_secs: default_periodic_interval(),
            settings_file: default_settings_file(),
        }
    }
}

impl GatheringSettings {
    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Seconds a rendered document may stay unused before it is dropped
    #[serde(default = "default_idle_expiry")]
    pub idle_expiry_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            idle_expiry_secs: default_idle_expiry(),
        }
    }
}

impl CacheSettings {
    pub fn idle_expiry(&self) -> Duration {
        Duration::from_secs(self.idle_expiry_secs)
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                uuid: ServerUuid::new(),
                name: default_server_name(),
            },
            database: DatabaseSettings::default(),
            gathering: GatheringSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration is written to `path`
    /// and returned. The generated server uuid is kept in that file.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig =
                toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Resolves a configured path relative to the directory of the config file.
    pub fn resolve_path(config_path: &Path, configured: &str) -> PathBuf {
        let configured = PathBuf::from(configured);
        if configured.is_absolute() {
            return configured;
        }
        match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(configured),
            _ => configured,
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.uuid.0.is_nil() {
            return Err("Server uuid cannot be nil".to_string());
        }
        if self.server.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }
        if self.database.path.is_empty() {
            return Err("Database path cannot be empty".to_string());
        }
        if self.gathering.workers == 0 {
            return Err("Gathering needs at least one worker".to_string());
        }
        if self.gathering.settings_file.is_empty() {
            return Err("Extension settings file cannot be empty".to_string());
        }
        if self.cache.idle_expiry_secs == 0 {
            return Err("Cache idle expiry must be at least one second".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
