//! Shared state for a single CLI invocation.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use xquare_core::auth::{LogoutReason, SessionEvent, User};
use xquare_core::{ApiClient, ApiError, Config};

/// Raised when a command needs a session and none is stored
#[derive(Debug)]
pub struct LoginRequired;

impl fmt::Display for LoginRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Not logged in")
    }
}

impl std::error::Error for LoginRequired {}

/// Whether `err` means the user has to go back to `xquare login`
pub fn login_required(err: &anyhow::Error) -> bool {
    err.downcast_ref::<LoginRequired>().is_some()
        || matches!(err.downcast_ref::<ApiError>(), Some(e) if e.requires_login())
}

pub struct App {
    pub config: Config,
    pub client: ApiClient,
    pub json: bool,
}

impl App {
    pub fn new(config: Config, api_url: Option<String>, json: bool) -> Result<Self> {
        let session = Arc::new(config.open_session_store()?);
        let api_url = api_url.unwrap_or_else(|| config.api_url());
        debug!(api_url = %api_url, authenticated = session.is_authenticated(), "Client ready");

        let client = ApiClient::new(&api_url, session)?;
        Ok(Self {
            config,
            client,
            json,
        })
    }

    /// Signed-in user, or `LoginRequired`
    pub fn require_user(&self) -> Result<User> {
        self.client
            .session()
            .user()
            .ok_or_else(|| LoginRequired.into())
    }

    /// Log session changes made behind the command's back (token refresh,
    /// forced logout).
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut events = self.client.session().subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedIn(user)) => {
                        info!(user_id = user.id, "Session tokens updated")
                    }
                    Ok(SessionEvent::LoggedOut(LogoutReason::RefreshFailed)) => {
                        warn!("Session could not be refreshed and was cleared")
                    }
                    Ok(SessionEvent::LoggedOut(LogoutReason::UserRequested)) => {
                        info!("Logged out")
                    }
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed session events"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_required_detection() {
        assert!(login_required(&anyhow::Error::new(LoginRequired)));
        assert!(login_required(
            &anyhow::Error::new(ApiError::SessionExpired).context("GET /projects failed")
        ));
        assert!(!login_required(&anyhow::Error::new(ApiError::RateLimited)));
        assert!(!login_required(&anyhow::anyhow!("boom")));
    }

    #[test]
    fn test_rejections_that_keep_the_session() {
        // Wrong password on `xquare login`
        assert!(!login_required(&anyhow::Error::new(
            ApiError::InvalidCredentials
        )));
        // Still 401 after a successful refresh
        assert!(!login_required(
            &anyhow::Error::new(ApiError::Unauthorized).context("GET /projects/7 failed")
        ));
    }
}
