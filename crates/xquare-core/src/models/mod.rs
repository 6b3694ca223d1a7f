//! Data models for xquare entities.
//!
//! This module contains the records exchanged with the xquare API:
//!
//! - `Project`, `ProjectOverview`: deployment projects
//! - `Application`, `BuildConfig`, `GitHubConfig`: services built from GitHub
//! - `Addon`, `AddonType`: managed datastores and brokers
//! - `GitHubInstallation`, `GitHubRepository`: GitHub App integration
//!
//! Request bodies (`*Request`) carry the same defaults the dashboard forms
//! start from.

pub mod addon;
pub mod application;
pub mod github;
pub mod project;

use thiserror::Error;

pub use addon::{Addon, AddonRequest, AddonType};
pub use application::{
    Application, ApplicationRequest, BuildConfig, BuildPreset, DockerBuild, EndpointConfig,
    GitHubConfig, GoBuild, JvmBuild, NodeServerBuild, PythonBuild, RustBuild, StaticSiteBuild,
    DEFAULT_BRANCH, DEFAULT_PORT, LATEST_HASH,
};
pub use github::{
    install_url, GitHubInstallation, GitHubRepository, RepositoryOwner, DEFAULT_APP_SLUG,
};
pub use project::{Project, ProjectOverview, ProjectRequest};

/// Resource tiers offered for applications and addons
pub const TIERS: &[&str] = &["x3.micro", "x3.small", "x3.medium", "x3.large"];

pub const DEFAULT_TIER: &str = "x3.small";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("Unknown tier '{0}' (expected one of: x3.micro, x3.small, x3.medium, x3.large)")]
    UnknownTier(String),

    #[error("Only one build preset may be set, found {0}")]
    MultiplePresets(usize),

    #[error("Endpoint port must be between 1 and 65535")]
    InvalidPort,

    #[error("Storage size must not be empty")]
    EmptyStorage,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

pub(crate) fn validate_tier(tier: &str) -> Result<(), ValidationError> {
    if TIERS.contains(&tier) {
        Ok(())
    } else {
        Err(ValidationError::UnknownTier(tier.to_string()))
    }
}
