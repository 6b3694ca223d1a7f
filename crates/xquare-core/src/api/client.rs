//! API client for communicating with the xquare REST API.
//!
//! This module provides the `ApiClient` struct for authentication and for
//! managing projects, applications, addons and GitHub installations.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::pipeline::RequestPipeline;
use super::transport::{HttpRequest, HttpTransport, Transport};
use super::ApiError;
use crate::auth::{AuthTokens, SessionStore};
use crate::models::{
    Addon, AddonRequest, Application, ApplicationRequest, GitHubInstallation, GitHubRepository,
    Project, ProjectOverview, ProjectRequest,
};

/// API client for xquare.
/// Clone is cheap - clones share the transport, session and refresh lock.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: RequestPipeline,
}

impl ApiClient {
    /// Create a client talking to `base_url` over HTTP
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Result<Self> {
        let transport = HttpTransport::new(base_url).context("Failed to build HTTP client")?;
        Ok(Self::with_transport(Arc::new(transport), session))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self {
            pipeline: RequestPipeline::new(transport, session),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.pipeline.session()
    }

    fn to_body<B: Serialize>(body: &B) -> Result<serde_json::Value> {
        serde_json::to_value(body).context("Failed to serialize request body")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .pipeline
            .send(HttpRequest::get(path))
            .await
            .with_context(|| format!("GET {} failed", path))?;
        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = HttpRequest::post(path).with_json(Self::to_body(body)?);
        let response = self
            .pipeline
            .send(request)
            .await
            .with_context(|| format!("POST {} failed", path))?;
        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = HttpRequest::put(path).with_json(Self::to_body(body)?);
        let response = self
            .pipeline
            .send(request)
            .await
            .with_context(|| format!("PUT {} failed", path))?;
        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.pipeline
            .send(HttpRequest::delete(path))
            .await
            .with_context(|| format!("DELETE {} failed", path))?;
        Ok(())
    }

    // ===== Authentication =====

    /// Log in with email and password and start a new session
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens> {
        let request = HttpRequest::post("/auth/login")
            .with_json(json!({ "email": email, "password": password }));

        let response = self
            .pipeline
            .send_anonymous(request)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized => anyhow::Error::new(ApiError::InvalidCredentials),
                other => anyhow::Error::new(other).context("Failed to send login request"),
            })?;

        let tokens: AuthTokens = response.json().context("Failed to parse login response")?;
        self.session().login(tokens.clone());
        Ok(tokens)
    }

    /// Create a new account. The user still has to log in afterwards.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<()> {
        let request = HttpRequest::post("/auth/register")
            .with_json(json!({ "email": email, "password": password, "name": name }));

        self.pipeline
            .send_anonymous(request)
            .await
            .context("Failed to register account")?;
        Ok(())
    }

    /// End the session. The server-side revocation is best effort; the local
    /// session is always cleared.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.session().refresh_token() {
            let request = HttpRequest::post("/auth/logout")
                .with_json(json!({ "refresh_token": refresh_token }));
            match self.pipeline.send(request).await {
                Ok(_) => debug!("Refresh token revoked"),
                Err(e) => warn!(error = %e, "Logout request failed"),
            }
        }
        self.session().logout();
    }

    // ===== Projects =====

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get("/projects").await
    }

    pub async fn get_project(&self, id: i64) -> Result<Project> {
        self.get(&format!("/projects/{}", id)).await
    }

    pub async fn create_project(&self, request: &ProjectRequest) -> Result<Project> {
        request.validate()?;
        self.post("/projects", request).await
    }

    pub async fn update_project(&self, id: i64, request: &ProjectRequest) -> Result<Project> {
        request.validate()?;
        self.put(&format!("/projects/{}", id), request).await
    }

    pub async fn delete_project(&self, id: i64) -> Result<()> {
        self.delete(&format!("/projects/{}", id)).await
    }

    /// Fetch a project with its applications and addons in parallel
    pub async fn project_overview(&self, id: i64) -> Result<ProjectOverview> {
        let (project, applications, addons) = futures::try_join!(
            self.get_project(id),
            self.list_applications(id),
            self.list_addons(id),
        )?;

        Ok(ProjectOverview {
            project,
            applications,
            addons,
        })
    }

    // ===== Applications =====

    pub async fn list_applications(&self, project_id: i64) -> Result<Vec<Application>> {
        self.get(&format!("/projects/{}/applications", project_id))
            .await
    }

    pub async fn get_application(&self, id: i64) -> Result<Application> {
        self.get(&format!("/applications/{}", id)).await
    }

    pub async fn create_application(
        &self,
        project_id: i64,
        request: &ApplicationRequest,
    ) -> Result<Application> {
        request.validate()?;
        self.post(&format!("/projects/{}/applications", project_id), request)
            .await
    }

    pub async fn update_application(
        &self,
        id: i64,
        request: &ApplicationRequest,
    ) -> Result<Application> {
        request.validate()?;
        self.put(&format!("/applications/{}", id), request).await
    }

    pub async fn delete_application(&self, id: i64) -> Result<()> {
        self.delete(&format!("/applications/{}", id)).await
    }

    // ===== Addons =====

    pub async fn list_addons(&self, project_id: i64) -> Result<Vec<Addon>> {
        self.get(&format!("/projects/{}/addons", project_id)).await
    }

    pub async fn get_addon(&self, id: i64) -> Result<Addon> {
        self.get(&format!("/addons/{}", id)).await
    }

    pub async fn create_addon(&self, project_id: i64, request: &AddonRequest) -> Result<Addon> {
        request.validate()?;
        self.post(&format!("/projects/{}/addons", project_id), request)
            .await
    }

    pub async fn update_addon(&self, id: i64, request: &AddonRequest) -> Result<Addon> {
        request.validate()?;
        self.put(&format!("/addons/{}", id), request).await
    }

    pub async fn delete_addon(&self, id: i64) -> Result<()> {
        self.delete(&format!("/addons/{}", id)).await
    }

    // ===== GitHub =====

    pub async fn list_installations(&self) -> Result<Vec<GitHubInstallation>> {
        self.get("/github/installations").await
    }

    pub async fn list_repositories(&self, installation_id: &str) -> Result<Vec<GitHubRepository>> {
        self.get(&format!(
            "/github/installations/{}/repositories",
            installation_id
        ))
        .await
    }
}
