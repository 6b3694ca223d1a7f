use anyhow::Result;
use clap::Subcommand;

use xquare_core::models::ProjectRequest;

use crate::app::App;
use crate::output;

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List your projects
    List,
    /// Show a project with its applications and addons
    Show { id: i64 },
    /// Create a project
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Rename or re-describe a project
    Update {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a project
    Delete { id: i64 },
}

pub async fn run(app: &App, command: ProjectCommands) -> Result<()> {
    app.require_user()?;
    let client = &app.client;

    match command {
        ProjectCommands::List => {
            let projects = client.list_projects().await?;
            if app.json {
                return output::print_json(&projects);
            }
            output::print_rows(&output::project_rows(&projects));
        }
        ProjectCommands::Show { id } => {
            let overview = client.project_overview(id).await?;
            if app.json {
                return output::print_json(&overview);
            }
            output::print_overview(&overview);
        }
        ProjectCommands::Create { name, description } => {
            let project = client
                .create_project(&ProjectRequest::new(name, description))
                .await?;
            if app.json {
                return output::print_json(&project);
            }
            println!("Created project {} (#{})", project.name, project.id);
        }
        ProjectCommands::Update {
            id,
            name,
            description,
        } => {
            // The API replaces both fields, so fill in what wasn't given
            let current = client.get_project(id).await?;
            let request = ProjectRequest::new(
                name.unwrap_or(current.name),
                description.unwrap_or(current.description),
            );
            let project = client.update_project(id, &request).await?;
            if app.json {
                return output::print_json(&project);
            }
            println!("Updated project {} (#{})", project.name, project.id);
        }
        ProjectCommands::Delete { id } => {
            client.delete_project(id).await?;
            println!("Deleted project #{}", id);
        }
    }
    Ok(())
}
