use crate::config::constants::files;
use crate::config::core::{
    ApiConfig, AuthConfig, ContextConfig, LoggingConfig, StreamConfig, ThrottleConfig,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for journai
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JournaiConfig {
    /// Backend connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Authorization token source
    #[serde(default)]
    pub auth: AuthConfig,

    /// Streaming transport settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Delivery pacing towards the renderer
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Default user and mentor identifiers
    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl JournaiConfig {
    /// Write a default `journai.toml` into `workspace`
    ///
    /// Returns the names of the files that were created. An existing file is
    /// left alone unless `force` is set.
    pub fn bootstrap_project<P: AsRef<Path>>(workspace: P, force: bool) -> Result<Vec<String>> {
        let workspace = workspace.as_ref();
        let mut created_files = Vec::new();

        let config_path = workspace.join(files::CONFIG_FILE_NAME);
        if !config_path.exists() || force {
            Self::create_sample_config(&config_path)?;
            created_files.push(files::CONFIG_FILE_NAME.to_string());
        }

        Ok(created_files)
    }

    /// Create sample configuration file
    pub fn create_sample_config<P: AsRef<Path>>(output: P) -> Result<()> {
        let output = output.as_ref();
        let default_config = JournaiConfig::default();
        let config_content = toml::to_string_pretty(&default_config)
            .context("Failed to serialize default configuration")?;

        fs::write(output, config_content)
            .with_context(|| format!("Failed to write config file: {}", output.display()))?;

        Ok(())
    }
}

/// Configuration manager for loading configuration files
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: JournaiConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        Self::load_from_workspace(std::env::current_dir()?)
    }

    /// Get the user's home directory path
    fn get_home_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            return Some(PathBuf::from(home));
        }

        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            return Some(PathBuf::from(userprofile));
        }

        dirs::home_dir()
    }

    /// Load configuration from a specific workspace
    ///
    /// Lookup order: `<workspace>/journai.toml`, `<workspace>/.journai/journai.toml`,
    /// `~/.journai/journai.toml`, then built-in defaults.
    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        let workspace = workspace.as_ref();

        let config_path = workspace.join(files::CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::load_from_file(&config_path);
        }

        let fallback_path = workspace
            .join(files::CONFIG_DIR_NAME)
            .join(files::CONFIG_FILE_NAME);
        if fallback_path.exists() {
            return Self::load_from_file(&fallback_path);
        }

        if let Some(home_dir) = Self::get_home_dir() {
            let home_config_path = home_dir
                .join(files::CONFIG_DIR_NAME)
                .join(files::CONFIG_FILE_NAME);
            if home_config_path.exists() {
                return Self::load_from_file(&home_config_path);
            }
        }

        tracing::debug!(workspace = %workspace.display(), "no journai.toml found, using defaults");
        Ok(Self {
            config: JournaiConfig::default(),
            config_path: None,
        })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: JournaiConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &JournaiConfig {
        &self.config
    }

    /// Take ownership of the loaded configuration
    pub fn into_config(self) -> JournaiConfig {
        self.config
    }

    /// Get the configuration file path (if loaded from file)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
