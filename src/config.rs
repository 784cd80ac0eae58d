//! Configuration loading and persistence.
//!
//! Reads `config.json` from the pushsync config directory and applies
//! environment overrides on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf};

use crate::constants;

/// Configuration for push subscription reconciliation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the social-network server.
    pub server_url: String,
    /// Base URL of the relay (app server).
    pub relay_url: String,
    /// Surface verbose log entries.
    pub verbose: bool,
    /// Server-key cache file; defaults to `{config_dir}/server_keys.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            relay_url: constants::DEFAULT_RELAY_URL.to_string(),
            verbose: false,
            key_store_path: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `PUSHSYNC_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("PUSHSYNC_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("pushsync")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|e| {
            log::debug!("Using default config: {:#}", e);
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(server_url) = std::env::var("PUSHSYNC_SERVER_URL") {
            self.server_url = server_url;
        }

        if let Ok(relay_url) = std::env::var("PUSHSYNC_RELAY_URL") {
            self.relay_url = relay_url;
        }

        if let Ok(verbose) = std::env::var("PUSHSYNC_VERBOSE") {
            self.verbose = matches!(verbose.as_str(), "1" | "true" | "yes");
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Server-key cache location.
    pub fn key_store_path(&self) -> Result<PathBuf> {
        match &self.key_store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("server_keys.json")),
        }
    }

    /// Fails if no server URL is configured.
    pub fn require_server_url(&self) -> Result<&str> {
        anyhow::ensure!(
            !self.server_url.is_empty(),
            "No server URL configured (set PUSHSYNC_SERVER_URL or server_url in config.json)"
        );
        Ok(&self.server_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.relay_url, constants::DEFAULT_RELAY_URL);
        assert!(!config.verbose);
        assert!(config.require_server_url().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server_url": "https://social.example"}"#).unwrap();
        assert_eq!(config.server_url, "https://social.example");
        assert_eq!(config.relay_url, constants::DEFAULT_RELAY_URL);
        assert_eq!(config.key_store_path, None);
    }

    #[test]
    fn test_explicit_key_store_path() {
        let config = Config {
            key_store_path: Some(PathBuf::from("/tmp/keys.json")),
            ..Config::default()
        };
        assert_eq!(config.key_store_path().unwrap(), PathBuf::from("/tmp/keys.json"));
    }
}
