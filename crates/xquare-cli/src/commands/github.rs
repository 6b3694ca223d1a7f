use anyhow::Result;
use clap::Subcommand;
use tracing::debug;

use xquare_core::models::install_url;

use crate::app::App;
use crate::output;

#[derive(Subcommand)]
pub enum GithubCommands {
    /// List GitHub App installations linked to your account
    Installations,
    /// List repositories an installation can access
    Repos { installation_id: String },
    /// Open the GitHub App installation page
    Install {
        /// Only print the URL
        #[arg(long)]
        no_browser: bool,
    },
}

pub async fn run(app: &App, command: GithubCommands) -> Result<()> {
    match command {
        GithubCommands::Installations => {
            app.require_user()?;
            let installations = app.client.list_installations().await?;
            if app.json {
                return output::print_json(&installations);
            }
            output::print_rows(&output::installation_rows(&installations));
        }
        GithubCommands::Repos { installation_id } => {
            app.require_user()?;
            let repositories = app.client.list_repositories(&installation_id).await?;
            if app.json {
                return output::print_json(&repositories);
            }
            output::print_rows(&output::repository_rows(&repositories));
        }
        GithubCommands::Install { no_browser } => {
            let url = install_url(app.config.github_app_slug());
            println!("Install the GitHub App: {}", url);
            if !no_browser {
                if let Err(e) = open::that(&url) {
                    debug!(error = %e, "Could not open browser");
                }
            }
        }
    }
    Ok(())
}
