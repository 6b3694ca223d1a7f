use anyhow::Result;
use clap::Subcommand;

use xquare_core::models::{AddonRequest, AddonType, DEFAULT_TIER};

use crate::app::App;
use crate::output;

#[derive(Subcommand)]
pub enum AddonCommands {
    /// List addons in a project
    List { project_id: i64 },
    /// Show one addon
    Show { id: i64 },
    /// Create an addon in a project
    Create {
        project_id: i64,
        #[arg(short, long)]
        name: String,
        /// mysql, postgresql, redis, mongodb, kafka or rabbitmq
        #[arg(short = 't', long = "type")]
        addon_type: AddonType,
        #[arg(long, default_value = DEFAULT_TIER)]
        tier: String,
        /// Storage size such as 20Gi (defaults per addon type)
        #[arg(long)]
        storage: Option<String>,
    },
    /// Change an addon's tier or storage
    Update {
        id: i64,
        #[arg(long)]
        tier: Option<String>,
        #[arg(long)]
        storage: Option<String>,
    },
    /// Delete an addon
    Delete { id: i64 },
}

pub async fn run(app: &App, command: AddonCommands) -> Result<()> {
    app.require_user()?;
    let client = &app.client;

    match command {
        AddonCommands::List { project_id } => {
            let addons = client.list_addons(project_id).await?;
            if app.json {
                return output::print_json(&addons);
            }
            output::print_rows(&output::addon_rows(&addons));
        }
        AddonCommands::Show { id } => {
            let addon = client.get_addon(id).await?;
            if app.json {
                return output::print_json(&addon);
            }
            output::print_rows(&output::addon_rows(std::slice::from_ref(&addon)));
        }
        AddonCommands::Create {
            project_id,
            name,
            addon_type,
            tier,
            storage,
        } => {
            let mut request = AddonRequest::new(name, addon_type).with_tier(tier);
            if let Some(storage) = storage {
                request = request.with_storage(storage);
            }
            let addon = client.create_addon(project_id, &request).await?;
            if app.json {
                return output::print_json(&addon);
            }
            println!(
                "Created {} addon {} (#{}) with {}",
                addon_type.label(),
                addon.name,
                addon.id,
                addon.storage
            );
        }
        AddonCommands::Update { id, tier, storage } => {
            let current = client.get_addon(id).await?;
            let addon_type: AddonType = current.addon_type.parse()?;
            let mut request = AddonRequest::new(current.name, addon_type)
                .with_tier(tier.unwrap_or(current.tier))
                .with_storage(storage.unwrap_or(current.storage));
            request.config = current.config;

            let addon = client.update_addon(id, &request).await?;
            if app.json {
                return output::print_json(&addon);
            }
            println!("Updated addon {} (#{})", addon.name, addon.id);
        }
        AddonCommands::Delete { id } => {
            client.delete_addon(id).await?;
            println!("Deleted addon #{}", id);
        }
    }
    Ok(())
}
