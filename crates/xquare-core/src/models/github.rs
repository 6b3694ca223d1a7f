use serde::{Deserialize, Serialize};

/// GitHub App that grants xquare access to repositories
pub const DEFAULT_APP_SLUG: &str = "xquare-infrastructure";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubInstallation {
    pub id: i64,
    pub installation_id: String,
    pub account_login: String,
    pub account_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: RepositoryOwner,
    #[serde(default)]
    pub private: bool,
}

/// Page where a user installs the GitHub App on an account
pub fn install_url(app_slug: &str) -> String {
    format!("https://github.com/apps/{}/installations/new", app_slug)
}
