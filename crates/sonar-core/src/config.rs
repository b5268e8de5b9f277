//! Configuration management for Sonar.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::DeductMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest page the counted search endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Main application configuration.
///
/// This is loaded from `~/.config/sonar/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote search API settings
    pub api: ApiConfig,
    /// Search behavior settings
    pub search: SearchConfig,
    /// Reachability probe settings
    pub probe: ProbeConfig,
    /// Workflow runtime settings
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SONAR_API_KEY`: API key
    /// - `SONAR_BASE_URL`: API base URL
    /// - `SONAR_DEDUCT_MODE`: `free` or `credit`
    /// - `SONAR_PROBE_CONCURRENCY`: probes in flight per page
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides onto an already-loaded config.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("SONAR_API_KEY") {
            self.api.key = key;
            tracing::debug!("Override api.key from env");
        }

        if let Ok(url) = std::env::var("SONAR_BASE_URL") {
            tracing::debug!("Override api.base_url from env: {}", url);
            self.api.base_url = url;
        }

        if let Ok(val) = std::env::var("SONAR_DEDUCT_MODE") {
            match val.parse::<DeductMode>() {
                Ok(mode) => {
                    self.search.deduct_mode = mode;
                    tracing::debug!("Override search.deduct_mode from env: {}", mode);
                }
                Err(e) => tracing::warn!("Ignoring SONAR_DEDUCT_MODE: {}", e),
            }
        }

        if let Ok(val) = std::env::var("SONAR_PROBE_CONCURRENCY") {
            if let Ok(concurrency) = val.parse::<usize>() {
                self.probe.concurrency = concurrency.max(1);
                tracing::debug!("Override probe.concurrency from env: {}", concurrency);
            }
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.search.page_size == 0 || self.search.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "search.page_size".to_string(),
                reason: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        if self.probe.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probe.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sonar/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "sonar", "sonar").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the cache directory path.
    ///
    /// Uses XDG base directories: `~/.cache/sonar`
    pub fn cache_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "sonar", "sonar").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.cache_dir().to_path_buf())
    }
}

/// Remote search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the search service
    pub base_url: String,
    /// API key sent with every request
    pub key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fofa.info".to_string(),
            key: String::new(),
            timeout_secs: 30,
            user_agent: format!("sonar/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Search behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// How rows beyond the free allotment are charged
    pub deduct_mode: DeductMode,
    /// Rows requested per page in offset mode
    pub page_size: usize,
    /// Fields used when the caller requests none
    pub default_fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deduct_mode: DeductMode::Free,
            page_size: MAX_PAGE_SIZE,
            default_fields: vec!["host".to_string(), "ip".to_string(), "port".to_string()],
        }
    }
}

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Per-probe timeout in seconds
    pub timeout_secs: u64,
    /// Probes in flight per page (1 = sequential)
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            concurrency: 1,
        }
    }
}

/// Workflow runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Directory for intermediate artifacts (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
}

impl WorkflowConfig {
    /// Resolved artifact directory.
    #[must_use]
    pub fn resolved_work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "https://fofa.info");
        assert_eq!(config.search.page_size, 1000);
        assert_eq!(config.search.default_fields, vec!["host", "ip", "port"]);
        assert_eq!(config.search.deduct_mode, DeductMode::Free);
        assert_eq!(config.probe.concurrency, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[probe]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.api.base_url, config.api.base_url);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.api.key = "secret".to_string();
        config.search.deduct_mode = DeductMode::Credit;

        config.save_to(&config_path).expect("save config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded.api.key, "secret");
        assert_eq!(loaded.search.deduct_mode, DeductMode::Credit);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.search.page_size, 1000);
    }

    #[test]
    fn test_invalid_page_size_rejected() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[search]\npage_size = 5000\n").expect("write config");

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[api]
key = "abc"

[search]
deduct_mode = "fcoin"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.api.key, "abc");
        assert_eq!(config.search.deduct_mode, DeductMode::Credit);
        // These should be defaults
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.probe.timeout_secs, 10);
    }

    #[test]
    fn test_work_dir_defaults_to_temp() {
        let config = WorkflowConfig::default();
        assert_eq!(config.resolved_work_dir(), std::env::temp_dir());
    }
}
