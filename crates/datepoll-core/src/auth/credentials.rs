use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

use crate::models::User;

/// Keychain service name used by `KeyringBackend`.
const SERVICE_NAME: &str = "datepoll";

/// Owner read/write only.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Storage for a handful of string values under fixed keys.
pub trait CredentialBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a key that does not exist is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// All entries in one JSON object file. Every write rewrites the file; the
/// file disappears when its last entry is removed.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read credentials file")?;
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;

        // Write beside the target, then rename over it
        let tmp_path = self.path.with_extension("tmp");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&tmp_path)
                .context("Failed to create credentials file")?;
            file.write_all(contents.as_bytes())
                .context("Failed to write credentials file")?;
            file.sync_all().context("Failed to write credentials file")?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&tmp_path, &contents).context("Failed to write credentials file")?;
        }

        std::fs::rename(&tmp_path, &self.path).context("Failed to replace credentials file")?;
        Ok(())
    }
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// One OS keychain entry per key.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBackend for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// Process-local backend. Clones share the same entries, so a caller can
/// keep a handle to inspect what the session persisted.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential map lock poisoned"))
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map(|entries| entries.is_empty()).unwrap_or(true)
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Durable mirror of the session: access token, refresh credential and a
/// serialized user snapshot. Written only by `SessionState`.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
}

impl CredentialStore {
    pub const TOKEN_KEY: &'static str = "token";
    pub const REFRESH_TOKEN_KEY: &'static str = "refresh_token";
    pub const USER_KEY: &'static str = "user";

    pub fn new(backend: impl CredentialBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.backend.get(Self::TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.backend.get(Self::REFRESH_TOKEN_KEY)
    }

    /// Stored user snapshot. A snapshot that no longer parses is reported as
    /// absent.
    pub fn user(&self) -> Result<Option<User>> {
        let Some(raw) = self.backend.get(Self::USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Failed to parse saved user");
                Ok(None)
            }
        }
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        self.backend.set(Self::TOKEN_KEY, token)
    }

    pub fn save_refresh_token(&self, refresh_token: &str) -> Result<()> {
        self.backend.set(Self::REFRESH_TOKEN_KEY, refresh_token)
    }

    pub fn save_user(&self, user: &User) -> Result<()> {
        let snapshot = serde_json::to_string(user).context("Failed to serialize user")?;
        self.backend.set(Self::USER_KEY, &snapshot)
    }

    /// Remove every entry. All removals are attempted; the first failure is
    /// returned.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in [Self::TOKEN_KEY, Self::REFRESH_TOKEN_KEY, Self::USER_KEY] {
            if let Err(e) = self.backend.remove(key) {
                warn!(key, error = %e, "Failed to remove stored credential");
                first_error.get_or_insert(e);
            }
        }
        debug!("Credential store cleared");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
