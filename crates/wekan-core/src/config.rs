//! Client configuration management.
//!
//! The configuration names the Wekan server, the account to log in with,
//! and the retry and timeout settings of the session. It is stored at
//! `~/.config/wekan-core/config.json` and can be overridden from the
//! environment (or a `.env` file):
//!
//! - `WEKAN_REMOTE_ADDR`
//! - `WEKAN_USERNAME`
//! - `WEKAN_PASSWORD` (never written to the config file)
//! - `WEKAN_RETRY_INTERVAL_SECS`
//! - `WEKAN_REQUEST_TIMEOUT_SECS`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::REQUEST_TIMEOUT_SECS;
use crate::auth::{CredentialStore, Credentials, MIN_RETRY_INTERVAL};

/// Application name used for the config directory path
const APP_NAME: &str = "wekan-core";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_REMOTE_ADDR: &str = "WEKAN_REMOTE_ADDR";
const ENV_USERNAME: &str = "WEKAN_USERNAME";
const ENV_PASSWORD: &str = "WEKAN_PASSWORD";
const ENV_RETRY_INTERVAL: &str = "WEKAN_RETRY_INTERVAL_SECS";
const ENV_REQUEST_TIMEOUT: &str = "WEKAN_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub remote_addr: Option<String>,
    pub username: Option<String>,
    pub retry_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Load the config file, then apply overrides from a `.env` file and
    /// the process environment.
    pub fn from_env() -> Result<Self> {
        // Missing .env files are fine
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded environment file");
        }
        let mut config = Self::load()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(addr) = lookup(ENV_REMOTE_ADDR) {
            self.remote_addr = Some(addr);
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(secs) = lookup(ENV_RETRY_INTERVAL) {
            self.retry_interval_secs = Some(
                secs.trim()
                    .parse()
                    .with_context(|| format!("Invalid {}: {}", ENV_RETRY_INTERVAL, secs))?,
            );
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            self.request_timeout_secs = Some(
                secs.trim()
                    .parse()
                    .with_context(|| format!("Invalid {}: {}", ENV_REQUEST_TIMEOUT, secs))?,
            );
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(MIN_RETRY_INTERVAL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }

    /// Build login credentials. The password comes from `WEKAN_PASSWORD`,
    /// or from the OS keychain when that is unset.
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    fn credentials_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
        let remote_addr = self
            .remote_addr
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No remote address configured"))?;
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No username configured"))?;

        let password = match lookup(ENV_PASSWORD) {
            Some(password) => password,
            None => CredentialStore::get_password(remote_addr, username)?,
        };

        Ok(Credentials::new(remote_addr, username, password)
            .with_retry_interval(self.retry_interval()))
    }

    /// HTTP client honouring the configured request timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()
            .context("Failed to build HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config {
            remote_addr: Some("https://old.example".to_string()),
            username: Some("alice".to_string()),
            retry_interval_secs: None,
            request_timeout_secs: Some(10),
        };
        config
            .apply_overrides(env(&[
                (ENV_REMOTE_ADDR, "https://board.example"),
                (ENV_RETRY_INTERVAL, "3"),
            ]))
            .expect("valid overrides");

        assert_eq!(config.remote_addr.as_deref(), Some("https://board.example"));
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.retry_interval(), Duration::from_secs(3));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(env(&[(ENV_RETRY_INTERVAL, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_credentials_from_env_password() {
        let config = Config {
            remote_addr: Some("https://board.example".to_string()),
            username: Some("alice".to_string()),
            retry_interval_secs: Some(0),
            request_timeout_secs: None,
        };
        let creds = config
            .credentials_with(env(&[(ENV_PASSWORD, "secret")]))
            .expect("credentials");
        assert_eq!(creds.remote_addr(), "https://board.example");
        assert_eq!(creds.username(), "alice");
        assert_eq!(creds.password(), "secret");
        // Zero is raised to the one second floor
        assert_eq!(creds.retry_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_credentials_require_remote_and_username() {
        let config = Config::default();
        assert!(config.credentials_with(env(&[(ENV_PASSWORD, "secret")])).is_err());
    }

    #[test]
    fn test_save_and_load_round_trip_file() {
        let dir = std::env::temp_dir().join(format!("wekan-core-config-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        let config = Config {
            remote_addr: Some("https://board.example".to_string()),
            username: Some("alice".to_string()),
            retry_interval_secs: Some(5),
            request_timeout_secs: None,
        };
        config.save_to(&path).expect("save config");
        assert_eq!(Config::load_from(&path).expect("load config"), config);
        let _ = std::fs::remove_dir_all(&dir);

        // A missing file yields the default config
        assert_eq!(Config::load_from(&path).expect("load missing"), Config::default());
    }
}
