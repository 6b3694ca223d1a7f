//! Authenticated request pipeline.
//!
//! Every request picks up the current access token from the `SessionStore`.
//! A `401` triggers one refresh through `POST /auth/refresh` followed by one
//! retry with the new token. If the refresh cannot be done, the session is
//! cleared and the caller gets `ApiError::SessionExpired`.
//!
//! Refreshes are serialized: when several requests are rejected with the
//! same stale token, the first one refreshes and the rest reuse its result.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::ApiError;
use crate::auth::{AuthTokens, LogoutReason, SessionStore};

const REFRESH_PATH: &str = "/auth/refresh";

/// A request in flight together with its one-shot retry flag.
struct PendingRequest {
    request: HttpRequest,
    retried: bool,
}

impl PendingRequest {
    fn new(request: HttpRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// Claim the single retry. Returns `false` if it was already used.
    fn begin_retry(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }
}

#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    refresh_lock: Arc<Mutex<()>>,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self {
            transport,
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Send with the current credentials, recovering once from an expired
    /// access token. Non-2xx responses other than 401 come back as the
    /// matching `ApiError` untouched.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut pending = PendingRequest::new(request);
        let mut token = self.session.access_token();

        loop {
            pending.request.set_bearer(token.as_deref())?;
            let response = self.transport.send(&pending.request).await?;

            if response.status != StatusCode::UNAUTHORIZED {
                return response.error_for_status();
            }
            if !pending.begin_retry() {
                warn!(path = %pending.request.path, "Request rejected again after token refresh");
                return Err(ApiError::Unauthorized);
            }

            debug!(path = %pending.request.path, "Access token rejected, refreshing");
            token = Some(self.refresh(token.as_deref()).await?);
        }
    }

    /// Send without credentials and without refresh handling. A 401 here
    /// means the request itself was rejected (e.g. a bad password).
    pub async fn send_anonymous(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut request = request;
        request.set_bearer(None)?;
        self.transport.send(&request).await?.error_for_status()
    }

    /// Obtain a usable access token after `rejected` was refused.
    async fn refresh(&self, rejected: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.session.snapshot();
        if let Some(token) = current.access_token() {
            if Some(token) != rejected {
                debug!("Reusing token refreshed by a concurrent request");
                return Ok(token.to_string());
            }
        }

        if current.is_empty() {
            debug!("Session already cleared by a concurrent refresh");
            return Err(ApiError::SessionExpired);
        }

        let Some(refresh_token) = current.refresh_token() else {
            warn!("Access token rejected and no refresh token available");
            return Err(self.invalidate());
        };

        match self.request_refresh(refresh_token).await {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                self.session.login(tokens);
                debug!("Access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                Err(self.invalidate())
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        let request =
            HttpRequest::post(REFRESH_PATH).with_json(json!({ "refresh_token": refresh_token }));
        self.transport
            .send(&request)
            .await?
            .error_for_status()?
            .json()
    }

    fn invalidate(&self) -> ApiError {
        self.session.logout_with(LogoutReason::RefreshFailed);
        ApiError::SessionExpired
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::header;

    use super::*;
    use crate::auth::{SessionEvent, User};

    #[derive(Debug, Clone)]
    struct Call {
        path: String,
        bearer: Option<String>,
        body: Option<serde_json::Value>,
    }

    #[derive(Debug, Clone, Copy)]
    enum RefreshFailure {
        /// 200 with a body that is not a token response
        Garbage,
        /// No response at all
        Transport,
    }

    /// Protected routes accept only `accepted`; `/auth/refresh` issues
    /// `grant` (or fails when `grant` is `None`).
    struct FakeApi {
        accepted: StdMutex<String>,
        grant: Option<&'static str>,
        accept_granted: bool,
        refresh_failure: Option<RefreshFailure>,
        refresh_delay: Duration,
        calls: StdMutex<Vec<Call>>,
    }

    impl FakeApi {
        fn new(accepted: &str, grant: Option<&'static str>) -> Self {
            Self {
                accepted: StdMutex::new(accepted.to_string()),
                grant,
                accept_granted: true,
                refresh_failure: None,
                refresh_delay: Duration::ZERO,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, path: &str) -> usize {
            self.calls().iter().filter(|c| c.path == path).count()
        }
    }

    #[async_trait]
    impl Transport for FakeApi {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.calls.lock().unwrap().push(Call {
                path: request.path.clone(),
                bearer: request
                    .headers
                    .get(header::AUTHORIZATION)
                    .map(|v| v.to_str().unwrap().to_string()),
                body: request.body.clone(),
            });

            match request.path.as_str() {
                REFRESH_PATH => {
                    if !self.refresh_delay.is_zero() {
                        tokio::time::sleep(self.refresh_delay).await;
                    }
                    match self.refresh_failure {
                        Some(RefreshFailure::Garbage) => {
                            return Ok(HttpResponse::new(StatusCode::OK, "not json"))
                        }
                        Some(RefreshFailure::Transport) => {
                            return Err(ApiError::InvalidResponse("connection reset".to_string()))
                        }
                        None => {}
                    }
                    let Some(grant) = self.grant else {
                        return Ok(HttpResponse::new(StatusCode::UNAUTHORIZED, "expired"));
                    };
                    if self.accept_granted {
                        *self.accepted.lock().unwrap() = grant.to_string();
                    }
                    let body = json!({
                        "access_token": grant,
                        "refresh_token": "r2",
                        "user": { "id": 1, "email": "u@x.com", "name": "U" },
                    });
                    Ok(HttpResponse::new(StatusCode::OK, body.to_string()))
                }
                "/public" => Ok(HttpResponse::new(StatusCode::OK, "[]")),
                "/boom" => Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "kaboom")),
                _ => {
                    let accepted = self.accepted.lock().unwrap().clone();
                    if request.bearer_token() == Some(accepted.as_str()) {
                        Ok(HttpResponse::new(StatusCode::OK, r#"{"ok":true}"#))
                    } else {
                        Ok(HttpResponse::new(StatusCode::UNAUTHORIZED, ""))
                    }
                }
            }
        }
    }

    fn logged_in_store() -> Arc<SessionStore> {
        let store = SessionStore::in_memory();
        store.login(AuthTokens {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            user: User {
                id: 1,
                email: "u@x.com".to_string(),
                name: "U".to_string(),
            },
        });
        Arc::new(store)
    }

    fn pipeline(api: &Arc<FakeApi>, session: &Arc<SessionStore>) -> RequestPipeline {
        RequestPipeline::new(api.clone(), session.clone())
    }

    #[tokio::test]
    async fn test_attaches_current_token() {
        let api = Arc::new(FakeApi::new("a1", None));
        let session = logged_in_store();

        let response = pipeline(&api, &session)
            .send(HttpRequest::get("/projects"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(api.calls()[0].bearer.as_deref(), Some("Bearer a1"));
    }

    #[tokio::test]
    async fn test_empty_session_sends_no_authorization_header() {
        let api = Arc::new(FakeApi::new("a1", None));
        let session = Arc::new(SessionStore::in_memory());

        pipeline(&api, &session)
            .send(HttpRequest::get("/public"))
            .await
            .unwrap();

        assert_eq!(api.calls().len(), 1);
        assert!(api.calls()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_transparently() {
        let api = Arc::new(FakeApi::new("a2", Some("a2")));
        let session = logged_in_store();

        let response = pipeline(&api, &session)
            .send(HttpRequest::get("/projects"))
            .await
            .unwrap();
        assert_eq!(response.body, r#"{"ok":true}"#);

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].bearer.as_deref(), Some("Bearer a1"));
        assert_eq!(calls[1].path, REFRESH_PATH);
        assert!(calls[1].bearer.is_none());
        assert_eq!(calls[1].body, Some(json!({ "refresh_token": "r1" })));
        assert_eq!(calls[2].bearer.as_deref(), Some("Bearer a2"));

        let state = session.snapshot();
        assert_eq!(state.access_token(), Some("a2"));
        assert_eq!(state.refresh_token(), Some("r2"));
        assert!(state.is_authenticated());
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_final() {
        let mut fake = FakeApi::new("never", Some("a2"));
        fake.accept_granted = false;
        let api = Arc::new(fake);
        let session = logged_in_store();

        let result = pipeline(&api, &session)
            .send(HttpRequest::get("/projects"))
            .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(api.count(REFRESH_PATH), 1);
        assert_eq!(api.count("/projects"), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session() {
        let api = Arc::new(FakeApi::new("a2", None));
        let session = logged_in_store();
        let mut events = session.subscribe();

        let result = pipeline(&api, &session)
            .send(HttpRequest::get("/projects"))
            .await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert!(session.snapshot().is_empty());
        assert_eq!(api.count("/projects"), 1);
        assert_eq!(api.count(REFRESH_PATH), 1);
        assert_eq!(
            events.try_recv().ok(),
            Some(SessionEvent::LoggedOut(LogoutReason::RefreshFailed))
        );
    }

    async fn assert_refresh_failure_clears_session(failure: RefreshFailure) {
        let mut fake = FakeApi::new("a2", Some("a2"));
        fake.refresh_failure = Some(failure);
        let api = Arc::new(fake);
        let session = logged_in_store();
        let mut events = session.subscribe();

        let result = pipeline(&api, &session)
            .send(HttpRequest::get("/projects"))
            .await;

        assert!(
            matches!(result, Err(ApiError::SessionExpired)),
            "{:?}: {:?}",
            failure,
            result
        );
        assert!(session.snapshot().is_empty());
        assert_eq!(api.count(REFRESH_PATH), 1);
        assert_eq!(api.count("/projects"), 1);
        assert_eq!(
            events.try_recv().ok(),
            Some(SessionEvent::LoggedOut(LogoutReason::RefreshFailed))
        );
    }

    #[tokio::test]
    async fn test_unparseable_refresh_body_clears_session() {
        assert_refresh_failure_clears_session(RefreshFailure::Garbage).await;
    }

    #[tokio::test]
    async fn test_refresh_transport_error_clears_session() {
        assert_refresh_failure_clears_session(RefreshFailure::Transport).await;
    }

    #[tokio::test]
    async fn test_concurrent_failed_refresh_logs_out_once() {
        let mut fake = FakeApi::new("a2", None);
        fake.refresh_delay = Duration::from_millis(20);
        let api = Arc::new(fake);
        let session = logged_in_store();
        let mut events = session.subscribe();
        let pipeline = pipeline(&api, &session);

        let (first, second) = tokio::join!(
            pipeline.send(HttpRequest::get("/projects")),
            pipeline.send(HttpRequest::get("/projects/1")),
        );

        assert!(matches!(first, Err(ApiError::SessionExpired)));
        assert!(matches!(second, Err(ApiError::SessionExpired)));
        assert_eq!(api.count(REFRESH_PATH), 1);
        assert_eq!(
            events.try_recv().ok(),
            Some(SessionEvent::LoggedOut(LogoutReason::RefreshFailed))
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_clears_session_without_refresh_call() {
        let api = Arc::new(FakeApi::new("a1", Some("a2")));
        let session = Arc::new(SessionStore::in_memory());

        let result = pipeline(&api, &session)
            .send(HttpRequest::get("/projects"))
            .await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(api.count(REFRESH_PATH), 0);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_pass_through() {
        let api = Arc::new(FakeApi::new("a1", Some("a2")));
        let session = logged_in_store();

        let result = pipeline(&api, &session).send(HttpRequest::get("/boom")).await;

        assert!(matches!(result, Err(ApiError::ServerError(body)) if body == "kaboom"));
        assert_eq!(api.count(REFRESH_PATH), 0);
        assert_eq!(session.access_token().as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_concurrent_rejections_share_one_refresh() {
        let mut fake = FakeApi::new("a2", Some("a2"));
        fake.refresh_delay = Duration::from_millis(20);
        let api = Arc::new(fake);
        let session = logged_in_store();
        let pipeline = pipeline(&api, &session);

        let (first, second) = tokio::join!(
            pipeline.send(HttpRequest::get("/projects")),
            pipeline.send(HttpRequest::get("/projects/1")),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(api.count(REFRESH_PATH), 1);
        assert_eq!(session.access_token().as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn test_anonymous_requests_skip_token_and_recovery() {
        let api = Arc::new(FakeApi::new("a1", Some("a2")));
        let session = logged_in_store();

        let result = pipeline(&api, &session)
            .send_anonymous(HttpRequest::post("/auth/login"))
            .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert!(api.calls()[0].bearer.is_none());
        assert_eq!(api.count(REFRESH_PATH), 0);
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_retry_can_only_be_claimed_once() {
        let mut pending = PendingRequest::new(HttpRequest::get("/projects"));
        assert!(pending.begin_retry());
        assert!(!pending.begin_retry());
    }
}
