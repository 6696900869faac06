//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: backend
//! address, request timeout, where credentials are kept, and the last email
//! used to sign in.
//!
//! Configuration is stored at `~/.config/datepoll/config.json`. Environment
//! variables override the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::auth::{CredentialStore, FileBackend, KeyringBackend};
use crate::guard::DEFAULT_APP_NAME;

/// Application name used for config/data directory paths
const APP_NAME: &str = "datepoll";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Credentials file name for the file backend
const CREDENTIALS_FILE: &str = "credentials.json";

pub const ENV_API_URL: &str = "DATEPOLL_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "DATEPOLL_TIMEOUT_SECS";
pub const ENV_CREDENTIALS: &str = "DATEPOLL_CREDENTIALS";

/// Where the credential store keeps its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackendKind {
    #[default]
    File,
    Keyring,
}

impl FromStr for CredentialBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" | "keychain" => Ok(Self::Keyring),
            other => Err(anyhow::anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackendKind,
    pub app_name: String,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackendKind::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the file, then apply environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Values that do not parse are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
        if let Some(raw) = lookup(ENV_CREDENTIALS) {
            match raw.parse() {
                Ok(kind) => self.credential_backend = kind,
                Err(e) => warn!(error = %e, "Ignoring invalid {}", ENV_CREDENTIALS),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(CREDENTIALS_FILE))
    }

    /// Open the credential store selected by `credential_backend`.
    pub fn credential_store(&self) -> Result<CredentialStore> {
        Ok(match self.credential_backend {
            CredentialBackendKind::File => {
                CredentialStore::new(FileBackend::new(self.credentials_path()?))
            }
            CredentialBackendKind::Keyring => CredentialStore::new(KeyringBackend::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.credential_backend, CredentialBackendKind::File);
        assert_eq!(config.app_name, "Doodle Clone");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_base_url":"https://polls.example.com","credential_backend":"keyring"}"#)
            .expect("Failed to parse config");
        assert_eq!(config.api_base_url, "https://polls.example.com");
        assert_eq!(config.credential_backend, CredentialBackendKind::Keyring);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, " https://api.example.com "),
            (ENV_TIMEOUT_SECS, "3"),
            (ENV_CREDENTIALS, "Keychain"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.credential_backend, CredentialBackendKind::Keyring);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_TIMEOUT_SECS => Some("0".to_string()),
            ENV_CREDENTIALS => Some("vault".to_string()),
            _ => None,
        });
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.credential_backend, CredentialBackendKind::File);
    }
}
