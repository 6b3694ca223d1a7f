//! xquare - a command-line client for the xquare deployment platform.
//!
//! Manage projects, deploy applications built from GitHub and addons
//! (databases, caches, brokers) into them, and link GitHub App
//! installations.

mod app;
mod commands;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use commands::{AddonCommands, AppCommands, GithubCommands, ProjectCommands};
use xquare_core::Config;

/// Exit code used when the user has to log in (again)
const EXIT_LOGIN_REQUIRED: u8 = 2;

#[derive(Parser)]
#[command(name = "xquare")]
#[command(version, about = "Deploy applications and addons on xquare")]
pub struct Cli {
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// API base URL (overrides XQUARE_API_URL and the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Also write logs to a daily file in the cache directory
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Log out and revoke the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create a new account
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        name: String,
    },
    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage applications
    Apps {
        #[command(subcommand)]
        command: AppCommands,
    },
    /// Manage addons (databases, caches, brokers)
    Addons {
        #[command(subcommand)]
        command: AddonCommands,
    },
    /// GitHub App installations and repositories
    Github {
        #[command(subcommand)]
        command: GithubCommands,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "xquare.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring unreadable config: {:#}", e);
        Config::default()
    });

    let log_dir = if cli.log_file {
        config.cache_dir().ok().map(|dir| dir.join("logs"))
    } else {
        None
    };
    let _guard = init_tracing(log_dir);
    debug!("xquare starting");

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if app::login_required(&e) => {
            info!(error = %e, "Login required");
            eprintln!("Session expired or missing. Run `xquare login` to sign in.");
            ExitCode::from(EXIT_LOGIN_REQUIRED)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut app = App::new(config, cli.api_url, cli.json)?;
    let _watcher = app.watch_session();

    match cli.command {
        Commands::Login { email } => commands::auth::login(&mut app, email).await,
        Commands::Logout => commands::auth::logout(&app).await,
        Commands::Whoami => commands::auth::whoami(&app),
        Commands::Register { email, name } => commands::auth::register(&app, &email, &name).await,
        Commands::Projects { command } => commands::projects::run(&app, command).await,
        Commands::Apps { command } => commands::apps::run(&app, command).await,
        Commands::Addons { command } => commands::addons::run(&app, command).await,
        Commands::Github { command } => commands::github::run(&app, command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_app_create() {
        let cli = Cli::try_parse_from([
            "xquare", "--json", "apps", "create", "3", "--name", "api", "--preset", "go",
            "--route", "/api", "--route", "/health",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Apps {
                command: AppCommands::Create(args),
            } => {
                assert_eq!(args.project_id, 3);
                assert_eq!(args.preset, xquare_core::models::BuildPreset::Go);
                assert_eq!(args.routes, vec!["/api", "/health"]);
                assert_eq!(args.port, 8080);
                assert_eq!(args.port, xquare_core::models::DEFAULT_PORT);
            }
            _ => panic!("expected apps create"),
        }
    }

    #[test]
    fn test_rejects_unknown_addon_type() {
        assert!(Cli::try_parse_from([
            "xquare", "addons", "create", "3", "--name", "db", "--type", "oracle",
        ])
        .is_err());
    }
}
