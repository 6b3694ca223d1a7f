use anyhow::{Context, Result};
use keyring::Entry;

use super::session::SessionState;
use super::storage::{self, SessionStorage, STORAGE_NAME};

const SERVICE_NAME: &str = "xquare";

/// Keeps the session record in the OS keychain instead of a plain file.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a different keychain service name, e.g. per API environment
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, STORAGE_NAME).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<SessionState>> {
        match self.entry()?.get_password() {
            Ok(contents) => storage::decode(&contents).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        let entry = self.entry()?;
        if state.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(e).context("Failed to delete session from keychain"),
            };
        }
        entry
            .set_password(&storage::encode(state)?)
            .context("Failed to store session in keychain")
    }
}
