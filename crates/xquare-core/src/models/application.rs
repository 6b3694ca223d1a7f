use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::github::{GitHubInstallation, GitHubRepository};
use super::{validate_tier, UnknownVariant, ValidationError, DEFAULT_TIER};

/// Default service port for new applications
pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_BRANCH: &str = "main";

/// Commit selector meaning "whatever the branch head is at build time"
pub const LATEST_HASH: &str = "latest";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub tier: String,
    #[serde(default)]
    pub github: Option<GitHubConfig>,
    #[serde(default)]
    pub build: Option<BuildConfig>,
    #[serde(default)]
    pub endpoints: Option<Vec<EndpointConfig>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn preset(&self) -> Option<BuildPreset> {
        self.build.as_ref().and_then(BuildConfig::preset)
    }

    /// `owner/repo@branch`, or "-" when not linked to GitHub
    pub fn source_display(&self) -> String {
        match self.github {
            Some(ref gh) => format!("{}/{}@{}", gh.owner, gh.repo, gh.branch),
            None => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    #[serde(rename = "installationID", alias = "installationId")]
    pub installation_id: String,
    pub hash: String,
    #[serde(rename = "triggerPaths", default, skip_serializing_if = "Option::is_none")]
    pub trigger_paths: Option<Vec<String>>,
}

impl GitHubConfig {
    /// Source settings for a repository picked from an installation
    pub fn from_repository(
        installation: &GitHubInstallation,
        repository: &GitHubRepository,
        branch: Option<&str>,
    ) -> Self {
        Self {
            owner: repository.owner.login.clone(),
            repo: repository.name.clone(),
            branch: branch.unwrap_or(DEFAULT_BRANCH).to_string(),
            installation_id: installation.installation_id.clone(),
            hash: LATEST_HASH.to_string(),
            trigger_paths: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    pub port: u16,
    #[serde(default)]
    pub routes: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            routes: Vec::new(),
        }
    }
}

// ===== Build presets =====

/// Gradle and Maven builds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JvmBuild {
    pub java_version: String,
    pub build_command: String,
    pub jar_output_path: String,
}

/// Node.js and Next.js servers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeServerBuild {
    pub node_version: String,
    pub build_command: String,
    pub start_command: String,
}

/// React, Vite and Vue bundles served as static files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StaticSiteBuild {
    pub node_version: String,
    pub build_command: String,
    pub dist_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GoBuild {
    pub go_version: String,
    pub build_command: String,
    pub binary_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RustBuild {
    pub rust_version: String,
    pub build_command: String,
    pub binary_name: String,
}

/// Django and Flask apps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PythonBuild {
    pub python_version: String,
    pub build_command: String,
    pub start_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DockerBuild {
    pub dockerfile_path: String,
    pub context_path: String,
}

/// Build settings keyed by preset name. The API expects at most one key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradle: Option<JvmBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodejs: Option<NodeServerBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react: Option<StaticSiteBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vite: Option<StaticSiteBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vue: Option<StaticSiteBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextjs: Option<NodeServerBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go: Option<GoBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rust: Option<RustBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven: Option<JvmBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub django: Option<PythonBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flask: Option<PythonBuild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerBuild>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPreset {
    Gradle,
    NodeJs,
    React,
    Vite,
    Vue,
    NextJs,
    Go,
    Rust,
    Maven,
    Django,
    Flask,
    Docker,
}

impl BuildPreset {
    pub const ALL: [BuildPreset; 12] = [
        BuildPreset::Gradle,
        BuildPreset::NodeJs,
        BuildPreset::React,
        BuildPreset::Vite,
        BuildPreset::Vue,
        BuildPreset::NextJs,
        BuildPreset::Go,
        BuildPreset::Rust,
        BuildPreset::Maven,
        BuildPreset::Django,
        BuildPreset::Flask,
        BuildPreset::Docker,
    ];

    /// Key used in `BuildConfig` on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPreset::Gradle => "gradle",
            BuildPreset::NodeJs => "nodejs",
            BuildPreset::React => "react",
            BuildPreset::Vite => "vite",
            BuildPreset::Vue => "vue",
            BuildPreset::NextJs => "nextjs",
            BuildPreset::Go => "go",
            BuildPreset::Rust => "rust",
            BuildPreset::Maven => "maven",
            BuildPreset::Django => "django",
            BuildPreset::Flask => "flask",
            BuildPreset::Docker => "docker",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuildPreset::Gradle => "Gradle (Spring Boot)",
            BuildPreset::NodeJs => "Node.js",
            BuildPreset::React => "React",
            BuildPreset::Vite => "Vite",
            BuildPreset::Vue => "Vue.js",
            BuildPreset::NextJs => "Next.js",
            BuildPreset::Go => "Go",
            BuildPreset::Rust => "Rust",
            BuildPreset::Maven => "Maven",
            BuildPreset::Django => "Django",
            BuildPreset::Flask => "Flask",
            BuildPreset::Docker => "Docker",
        }
    }
}

impl fmt::Display for BuildPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildPreset {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        BuildPreset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == wanted)
            .ok_or_else(|| UnknownVariant::new("build preset", s))
    }
}

fn jvm(build_command: &str, jar_output_path: &str) -> JvmBuild {
    JvmBuild {
        java_version: "17".to_string(),
        build_command: build_command.to_string(),
        jar_output_path: jar_output_path.to_string(),
    }
}

fn node_server(node_version: &str) -> NodeServerBuild {
    NodeServerBuild {
        node_version: node_version.to_string(),
        build_command: "npm ci && npm run build".to_string(),
        start_command: "npm start".to_string(),
    }
}

fn static_site(node_version: &str, dist_path: &str) -> StaticSiteBuild {
    StaticSiteBuild {
        node_version: node_version.to_string(),
        build_command: "npm ci && npm run build".to_string(),
        dist_path: dist_path.to_string(),
    }
}

fn python(build_command: &str, start_command: &str) -> PythonBuild {
    PythonBuild {
        python_version: "3.11".to_string(),
        build_command: build_command.to_string(),
        start_command: start_command.to_string(),
    }
}

impl BuildConfig {
    /// Build settings prefilled with the preset's defaults
    pub fn from_preset(preset: BuildPreset) -> Self {
        let mut config = Self::default();
        match preset {
            BuildPreset::Gradle => {
                config.gradle = Some(jvm(
                    "./gradlew bootJar -x test --build-cache --no-daemon",
                    "/build/libs/*.jar",
                ))
            }
            BuildPreset::NodeJs => config.nodejs = Some(node_server("18")),
            BuildPreset::React => config.react = Some(static_site("18", "/build")),
            BuildPreset::Vite => config.vite = Some(static_site("20", "/dist")),
            BuildPreset::Vue => config.vue = Some(static_site("18", "/dist")),
            BuildPreset::NextJs => config.nextjs = Some(node_server("20")),
            BuildPreset::Go => {
                config.go = Some(GoBuild {
                    go_version: "1.21".to_string(),
                    build_command: "go build -o myservice .".to_string(),
                    binary_name: "myservice".to_string(),
                })
            }
            BuildPreset::Rust => {
                config.rust = Some(RustBuild {
                    rust_version: "1.75".to_string(),
                    build_command: "cargo build --release".to_string(),
                    binary_name: "rust-service".to_string(),
                })
            }
            BuildPreset::Maven => {
                config.maven = Some(jvm("mvn clean package -DskipTests", "/target/*.jar"))
            }
            BuildPreset::Django => {
                config.django = Some(python(
                    "python manage.py collectstatic --noinput",
                    "python manage.py runserver 0.0.0.0:8080",
                ))
            }
            BuildPreset::Flask => {
                config.flask = Some(python(
                    "pip install -r requirements.txt",
                    "gunicorn -w 4 -b 0.0.0.0:8080 app:app",
                ))
            }
            BuildPreset::Docker => {
                config.docker = Some(DockerBuild {
                    dockerfile_path: "./Dockerfile".to_string(),
                    context_path: ".".to_string(),
                })
            }
        }
        config
    }

    /// Presets with settings present, in declaration order
    pub fn presets(&self) -> Vec<BuildPreset> {
        let set = [
            self.gradle.is_some(),
            self.nodejs.is_some(),
            self.react.is_some(),
            self.vite.is_some(),
            self.vue.is_some(),
            self.nextjs.is_some(),
            self.go.is_some(),
            self.rust.is_some(),
            self.maven.is_some(),
            self.django.is_some(),
            self.flask.is_some(),
            self.docker.is_some(),
        ];
        BuildPreset::ALL
            .into_iter()
            .zip(set)
            .filter_map(|(preset, present)| present.then_some(preset))
            .collect()
    }

    pub fn preset(&self) -> Option<BuildPreset> {
        self.presets().into_iter().next()
    }
}

/// Body for creating or updating an application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationRequest {
    pub name: String,
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<EndpointConfig>>,
}

impl ApplicationRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tier: DEFAULT_TIER.to_string(),
            github: None,
            build: None,
            endpoints: Some(vec![EndpointConfig::default()]),
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    pub fn with_preset(mut self, preset: BuildPreset) -> Self {
        self.build = Some(BuildConfig::from_preset(preset));
        self
    }

    pub fn with_github(mut self, github: GitHubConfig) -> Self {
        self.github = Some(github);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Vec<EndpointConfig>) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("Application"));
        }
        validate_tier(&self.tier)?;
        if let Some(ref build) = self.build {
            let count = build.presets().len();
            if count > 1 {
                return Err(ValidationError::MultiplePresets(count));
            }
        }
        let endpoints = self.endpoints.as_deref().unwrap_or_default();
        if endpoints.iter().any(|e| e.port == 0) {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}
