use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use xquare_core::models::{
    ApplicationRequest, BuildPreset, EndpointConfig, GitHubConfig, DEFAULT_PORT, DEFAULT_TIER,
};
use xquare_core::ApiClient;

use crate::app::App;
use crate::output;

#[derive(Subcommand)]
pub enum AppCommands {
    /// List applications in a project
    List { project_id: i64 },
    /// Show one application
    Show { id: i64 },
    /// Create an application in a project
    Create(AppCreateArgs),
    /// Change an application's tier or endpoint
    Update {
        id: i64,
        #[arg(long)]
        tier: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long = "route")]
        routes: Vec<String>,
    },
    /// Delete an application
    Delete { id: i64 },
}

#[derive(Args)]
pub struct AppCreateArgs {
    pub project_id: i64,

    #[arg(short, long)]
    pub name: String,

    /// Build preset (gradle, nodejs, react, vite, vue, nextjs, go, rust, maven, django, flask, docker)
    #[arg(short, long)]
    pub preset: BuildPreset,

    #[arg(long, default_value = DEFAULT_TIER)]
    pub tier: String,

    /// GitHub App installation ID the repository belongs to
    #[arg(long, requires = "repo")]
    pub installation: Option<String>,

    /// Repository name (or owner/name) to build from
    #[arg(long)]
    pub repo: Option<String>,

    #[arg(long, requires = "repo")]
    pub branch: Option<String>,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Route served by the application; repeat for more
    #[arg(long = "route")]
    pub routes: Vec<String>,
}

pub async fn run(app: &App, command: AppCommands) -> Result<()> {
    app.require_user()?;
    let client = &app.client;

    match command {
        AppCommands::List { project_id } => {
            let applications = client.list_applications(project_id).await?;
            if app.json {
                return output::print_json(&applications);
            }
            output::print_rows(&output::application_rows(&applications));
        }
        AppCommands::Show { id } => {
            let application = client.get_application(id).await?;
            if app.json {
                return output::print_json(&application);
            }
            output::print_rows(&output::application_rows(std::slice::from_ref(&application)));
        }
        AppCommands::Create(args) => {
            let project_id = args.project_id;
            let request = create_request(client, args).await?;
            let application = client.create_application(project_id, &request).await?;
            if app.json {
                return output::print_json(&application);
            }
            println!(
                "Created application {} (#{}) in project #{}",
                application.name, application.id, project_id
            );
        }
        AppCommands::Update {
            id,
            tier,
            port,
            routes,
        } => {
            let current = client.get_application(id).await?;
            let mut request = ApplicationRequest::new(current.name)
                .with_tier(tier.unwrap_or(current.tier));
            request.github = current.github;
            request.build = current.build;
            request.endpoints = current.endpoints;

            if port.is_some() || !routes.is_empty() {
                let existing = request
                    .endpoints
                    .as_ref()
                    .and_then(|e| e.first().cloned())
                    .unwrap_or_default();
                let endpoint = EndpointConfig {
                    port: port.unwrap_or(existing.port),
                    routes: if routes.is_empty() {
                        existing.routes
                    } else {
                        routes
                    },
                };
                request = request.with_endpoints(vec![endpoint]);
            }

            let application = client.update_application(id, &request).await?;
            if app.json {
                return output::print_json(&application);
            }
            println!("Updated application {} (#{})", application.name, application.id);
        }
        AppCommands::Delete { id } => {
            client.delete_application(id).await?;
            println!("Deleted application #{}", id);
        }
    }
    Ok(())
}

async fn create_request(client: &ApiClient, args: AppCreateArgs) -> Result<ApplicationRequest> {
    let mut request = ApplicationRequest::new(args.name)
        .with_tier(args.tier)
        .with_preset(args.preset)
        .with_endpoints(vec![EndpointConfig {
            port: args.port,
            routes: args.routes,
        }]);

    if let Some(repo) = args.repo {
        let github = resolve_repository(
            client,
            args.installation.as_deref(),
            &repo,
            args.branch.as_deref(),
        )
        .await?;
        request = request.with_github(github);
    }
    Ok(request)
}

/// Find `repo` among the repositories visible to the user's installations
async fn resolve_repository(
    client: &ApiClient,
    installation: Option<&str>,
    repo: &str,
    branch: Option<&str>,
) -> Result<GitHubConfig> {
    let installations = client.list_installations().await?;
    let candidates: Vec<_> = match installation {
        Some(id) => {
            let found: Vec<_> = installations
                .into_iter()
                .filter(|i| i.installation_id == id)
                .collect();
            if found.is_empty() {
                anyhow::bail!("No GitHub App installation with ID {}", id);
            }
            found
        }
        None => installations,
    };
    if candidates.is_empty() {
        anyhow::bail!("The GitHub App is not installed. Run `xquare github install` first.");
    }

    for inst in &candidates {
        let repositories = client
            .list_repositories(&inst.installation_id)
            .await
            .with_context(|| format!("Failed to list repositories of {}", inst.account_login))?;
        if let Some(found) = repositories
            .iter()
            .find(|r| r.full_name == repo || r.name == repo)
        {
            return Ok(GitHubConfig::from_repository(inst, found, branch));
        }
    }
    anyhow::bail!("Repository '{}' not found in any GitHub App installation", repo)
}
