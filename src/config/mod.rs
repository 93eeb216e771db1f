//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signed-in user id, persisted across restarts and cleared on logout
    pub user_id: Option<String>,
    /// Base URL of the store project (e.g. https://xyz.supabase.co)
    pub store_url: Option<String>,
    /// Anonymous API key for the store
    pub anon_key: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "courier-cli", "courier-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the API key)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Store credentials. Missing credentials are the one fatal condition
    /// at startup.
    pub fn store_credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .store_url
            .as_deref()
            .context("No store URL configured. Run 'courier login --store-url <url> --anon-key <key> --phone <number>'.")?;
        let key = self
            .anon_key
            .as_deref()
            .context("No store API key configured. Run 'courier login --store-url <url> --anon-key <key> --phone <number>'.")?;
        Ok((url, key))
    }

    /// Signed-in user id, or an error telling the user to log in.
    pub fn require_user_id(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .context("Not signed in. Run 'courier login' first.")
    }

    /// Forget the signed-in user but keep the store endpoint.
    pub fn clear_session(&mut self) {
        self.user_id = None;
    }
}
