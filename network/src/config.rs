// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client configuration file

use anyhow::{Context, Result};
use directories::ProjectDirs;
use pichess_core::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend bridge
    pub backend_url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How often the front-end polls backend connectivity
    #[serde(with = "humantime_serde")]
    pub connectivity_poll: Duration,
    /// Engine-vs-engine speed, `1..=20`
    pub default_speed: u8,
    /// Start the next engine-vs-engine game automatically
    pub auto_restart: bool,
    pub scheduler: SchedulerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5001".to_string(),
            request_timeout: Duration::from_secs(15),
            connectivity_poll: Duration::from_secs(10),
            default_speed: 10,
            auto_restart: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("io", "pichess", "pichess")
        .context("Failed to determine config directory")?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Load the config from the platform config directory, writing the
/// defaults there on first run
pub fn load_config() -> Result<ClientConfig> {
    let config_path = get_config_path().context("Failed to determine config path")?;
    load_config_from(&config_path)
}

pub fn load_config_from(config_path: &Path) -> Result<ClientConfig> {
    if !config_path.exists() {
        tracing::info!("Config file not found, creating default at: {}", config_path.display());

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let default_config = ClientConfig::default();
        let toml_content =
            toml::to_string_pretty(&default_config).context("Failed to serialize default config")?;
        fs::write(config_path, toml_content).context("Failed to write default config file")?;

        return Ok(default_config);
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    toml::from_str::<ClientConfig>(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

pub fn save_config(config: &ClientConfig) -> Result<()> {
    let config_path = get_config_path().context("Failed to determine config path")?;
    save_config_to(config, &config_path)
}

pub fn save_config_to(config: &ClientConfig, config_path: &Path) -> Result<()> {
    let toml_content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(config_path, toml_content)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    tracing::info!("Saved config to: {}", config_path.display());
    Ok(())
}
