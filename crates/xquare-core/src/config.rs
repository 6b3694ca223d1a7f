//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API endpoint, where the session is stored, and the
//! last email used to log in.
//!
//! Configuration is stored at `~/.config/xquare/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, SessionStore};
use crate::models::DEFAULT_APP_SLUG;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "xquare";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "https://xquare-server.dsmhs.kr/api/v1";

/// Environment variable that overrides the configured API URL
pub const API_URL_ENV: &str = "XQUARE_API_URL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStorageKind {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub session_storage: SessionStorageKind,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default)]
    pub github_app_slug: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// API base URL: `XQUARE_API_URL`, then the config file, then the default
    pub fn api_url(&self) -> String {
        self.resolve_api_url(std::env::var(API_URL_ENV).ok())
    }

    fn resolve_api_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn github_app_slug(&self) -> &str {
        self.github_app_slug.as_deref().unwrap_or(DEFAULT_APP_SLUG)
    }

    /// Open the session store on the configured backend
    pub fn open_session_store(&self) -> Result<SessionStore> {
        let store = match self.session_storage {
            SessionStorageKind::File => SessionStore::open(FileStorage::new(self.cache_dir()?)),
            SessionStorageKind::Keyring => SessionStore::open(KeyringStorage::new()),
        };
        Ok(store)
    }
}
