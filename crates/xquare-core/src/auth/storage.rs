use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Name of the durable session record
pub const STORAGE_NAME: &str = "auth-storage";

/// Layout version of the persisted record
const STORAGE_VERSION: u32 = 0;

/// Durable home for the session record.
///
/// Saving an empty `SessionState` is how a backend learns the user logged
/// out; backends may delete the record instead of writing it.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionState>>;

    fn save(&self, state: &SessionState) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    state: SessionState,
    #[serde(default)]
    version: u32,
}

pub(crate) fn encode(state: &SessionState) -> Result<String> {
    let record = PersistedRecord {
        state: state.clone(),
        version: STORAGE_VERSION,
    };
    serde_json::to_string_pretty(&record).context("Failed to serialize session record")
}

pub(crate) fn decode(contents: &str) -> Result<SessionState> {
    let record: PersistedRecord =
        serde_json::from_str(contents).context("Failed to parse session record")?;
    if record.version != STORAGE_VERSION {
        anyhow::bail!("Unsupported session record version {}", record.version);
    }
    Ok(record.state)
}

/// Stores the session as `auth-storage.json` in the cache directory.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(format!("{}.json", STORAGE_NAME)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<SessionState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        decode(&contents).map(Some)
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        if state.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove session file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, encode(state)?).context("Failed to write session file")?;
        Ok(())
    }
}

/// In-process storage. Clones share the same record, which lets a test
/// "restart" by opening a second store over a clone.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    record: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw persisted JSON, if anything has been saved
    pub fn raw(&self) -> Option<String> {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Overwrite the raw record, e.g. to simulate a corrupted file
    pub fn set_raw(&self, contents: impl Into<String>) {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(contents.into());
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<SessionState>> {
        self.raw().as_deref().map(decode).transpose()
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        let encoded = encode(state)?;
        self.set_raw(encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{AuthTokens, User};

    fn tokens() -> AuthTokens {
        AuthTokens {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            user: User {
                id: 1,
                email: "u@x.com".to_string(),
                name: "U".to_string(),
            },
        }
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.load().unwrap().is_none());

        let state = SessionState::from_tokens(tokens());
        storage.save(&state).unwrap();
        assert!(storage.path().ends_with("auth-storage.json"));

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_file_storage_clears_on_empty_save() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        storage.save(&SessionState::from_tokens(tokens())).unwrap();
        assert!(storage.path().exists());

        storage.save(&SessionState::default()).unwrap();
        assert!(!storage.path().exists());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_record_layout() {
        let encoded = encode(&SessionState::from_tokens(tokens())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["isAuthenticated"], true);
        assert_eq!(value["state"]["accessToken"], "a1");
        assert_eq!(value["state"]["refreshToken"], "r1");
        assert_eq!(value["state"]["user"]["email"], "u@x.com");
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let contents = r#"{"state":{"isAuthenticated":false,"user":null,"accessToken":null,"refreshToken":null},"version":7}"#;
        assert!(decode(contents).is_err());
    }

    #[test]
    fn test_memory_storage_shared_between_clones() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.save(&SessionState::from_tokens(tokens())).unwrap();

        let loaded = other.load().unwrap().unwrap();
        assert_eq!(loaded.access_token(), Some("a1"));
    }
}
