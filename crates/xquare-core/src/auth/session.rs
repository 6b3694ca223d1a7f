use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::storage::{MemoryStorage, SessionStorage};

/// Buffered session events per subscriber before lagging
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

/// Body of a successful login or refresh response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Snapshot of the authenticated session.
///
/// The four fields are only ever set together (from `AuthTokens`) or
/// cleared together (`Default`), so `is_authenticated()` holds exactly when
/// both a user and an access token are present.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    is_authenticated: bool,
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl SessionState {
    pub fn from_tokens(tokens: AuthTokens) -> Self {
        Self {
            is_authenticated: true,
            user: Some(tokens.user),
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Either fully cleared or fully populated. Anything in between can only
    /// come from a hand-edited or foreign record.
    pub fn is_consistent(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        self.is_authenticated
            && self.user.is_some()
            && self.access_token.is_some()
            && self.refresh_token.is_some()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "<redacted>");
        f.debug_struct("SessionState")
            .field("is_authenticated", &self.is_authenticated)
            .field("user", &self.user)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to sign out
    UserRequested,
    /// The access token expired and could not be refreshed
    RefreshFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(User),
    LoggedOut(LogoutReason),
}

/// Owner of the session record.
///
/// Every write replaces the whole record under one lock and persists it
/// before the lock is released, so readers never see a half-applied login or
/// logout and the durable copy follows the same order as memory.
pub struct SessionStore {
    state: RwLock<SessionState>,
    storage: Box<dyn SessionStorage>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Create an empty store without reading `storage`
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(SessionState::default()),
            storage: Box::new(storage),
            events,
        }
    }

    /// Create a store rehydrated from `storage`.
    ///
    /// Unreadable or inconsistent records are ignored and the store starts
    /// signed out.
    pub fn open(storage: impl SessionStorage + 'static) -> Self {
        let store = Self::new(storage);
        match store.storage.load() {
            Ok(Some(state)) if state.is_consistent() => {
                debug!(authenticated = state.is_authenticated(), "Session restored");
                *store.write_state() = state;
            }
            Ok(Some(_)) => warn!("Discarding inconsistent session record"),
            Ok(None) => debug!("No stored session"),
            Err(e) => warn!(error = %e, "Failed to load session"),
        }
        store
    }

    /// Non-persistent store, mostly for tests and one-off clients
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Current session snapshot
    pub fn snapshot(&self) -> SessionState {
        self.read_state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_state().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_state().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read_state().user.clone()
    }

    /// Replace the session with freshly issued tokens
    pub fn login(&self, tokens: AuthTokens) {
        let user = tokens.user.clone();
        self.replace(SessionState::from_tokens(tokens));
        info!(user_id = user.id, "Session started");
        let _ = self.events.send(SessionEvent::LoggedIn(user));
    }

    pub fn logout(&self) {
        self.logout_with(LogoutReason::UserRequested);
    }

    pub fn logout_with(&self, reason: LogoutReason) {
        self.replace(SessionState::default());
        info!(?reason, "Session cleared");
        let _ = self.events.send(SessionEvent::LoggedOut(reason));
    }

    /// Swap the user record of an authenticated session. Returns `false`
    /// and leaves the store untouched when nobody is signed in.
    pub fn update_user(&self, user: User) -> bool {
        let mut state = self.write_state();
        if !state.is_authenticated {
            return false;
        }
        let mut next = state.clone();
        next.user = Some(user);
        self.persist(&next);
        *state = next;
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn replace(&self, next: SessionState) {
        let mut state = self.write_state();
        self.persist(&next);
        *state = next;
    }

    fn persist(&self, state: &SessionState) {
        if let Err(e) = self.storage.save(state) {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.read_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(access: &str, refresh: &str) -> AuthTokens {
        AuthTokens {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            user: User {
                id: 1,
                email: "u@x.com".to_string(),
                name: "U".to_string(),
            },
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SessionStore::in_memory();
        let state = store.snapshot();
        assert!(!state.is_authenticated());
        assert!(state.user().is_none());
        assert!(state.access_token().is_none());
        assert!(state.refresh_token().is_none());
    }

    #[test]
    fn test_login_sets_all_fields() {
        let store = SessionStore::in_memory();
        store.login(tokens("a1", "r1"));

        let state = store.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.access_token(), Some("a1"));
        assert_eq!(state.refresh_token(), Some("r1"));
        assert_eq!(state.user().map(|u| u.email.as_str()), Some("u@x.com"));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_login_overwrites_previous_session() {
        let store = SessionStore::in_memory();
        store.login(tokens("a1", "r1"));
        store.login(tokens("a2", "r2"));

        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    }

    #[test]
    fn test_logout_clears_all_fields() {
        let store = SessionStore::in_memory();
        store.login(tokens("a1", "r1"));
        store.logout();

        let state = store.snapshot();
        assert!(state.is_empty());
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_session_survives_reopen() {
        let storage = MemoryStorage::new();
        let store = SessionStore::open(storage.clone());
        store.login(tokens("a1", "r1"));
        drop(store);

        let reopened = SessionStore::open(storage);
        let state = reopened.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.access_token(), Some("a1"));
        assert_eq!(state.refresh_token(), Some("r1"));
        assert_eq!(
            state.user(),
            Some(&User {
                id: 1,
                email: "u@x.com".to_string(),
                name: "U".to_string(),
            })
        );
    }

    #[test]
    fn test_logout_is_persisted() {
        let storage = MemoryStorage::new();
        let store = SessionStore::open(storage.clone());
        store.login(tokens("a1", "r1"));
        store.logout();

        let reopened = SessionStore::open(storage);
        assert!(reopened.snapshot().is_empty());
    }

    #[test]
    fn test_inconsistent_record_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set_raw(
            r#"{"state":{"isAuthenticated":true,"user":null,"accessToken":"a1","refreshToken":"r1"},"version":0}"#,
        );

        let store = SessionStore::open(storage);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_corrupted_record_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set_raw("{not json");

        let store = SessionStore::open(storage);
        assert!(!store.is_authenticated());
    }

    /// Loads nothing and refuses every save
    struct ReadOnlyStorage;

    impl SessionStorage for ReadOnlyStorage {
        fn load(&self) -> anyhow::Result<Option<SessionState>> {
            Ok(None)
        }

        fn save(&self, _state: &SessionState) -> anyhow::Result<()> {
            anyhow::bail!("read-only file system")
        }
    }

    #[test]
    fn test_failed_persist_still_updates_memory() {
        let store = SessionStore::open(ReadOnlyStorage);
        let mut events = store.subscribe();

        store.login(tokens("a1", "r1"));
        let state = store.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.access_token(), Some("a1"));
        assert_eq!(state.refresh_token(), Some("r1"));
        assert!(matches!(events.try_recv(), Ok(SessionEvent::LoggedIn(_))));

        store.logout();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_update_user_requires_session() {
        let store = SessionStore::in_memory();
        let renamed = User {
            id: 1,
            email: "u@x.com".to_string(),
            name: "Renamed".to_string(),
        };
        assert!(!store.update_user(renamed.clone()));
        assert!(store.snapshot().is_empty());

        store.login(tokens("a1", "r1"));
        assert!(store.update_user(renamed));
        assert_eq!(store.user().map(|u| u.name), Some("Renamed".to_string()));
        assert_eq!(store.access_token().as_deref(), Some("a1"));
    }

    #[test]
    fn test_events_are_broadcast() {
        let store = SessionStore::in_memory();
        let mut events = store.subscribe();

        store.login(tokens("a1", "r1"));
        store.logout_with(LogoutReason::RefreshFailed);

        assert!(matches!(events.try_recv(), Ok(SessionEvent::LoggedIn(user)) if user.id == 1));
        assert_eq!(
            events.try_recv().ok(),
            Some(SessionEvent::LoggedOut(LogoutReason::RefreshFailed))
        );
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let state = SessionState::from_tokens(tokens("secret-access", "secret-refresh"));
        let rendered = format!("{:?}", state);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("u@x.com"));
    }
}
