//! Subcommand implementations.

pub mod addons;
pub mod apps;
pub mod auth;
pub mod github;
pub mod projects;

pub use addons::AddonCommands;
pub use apps::AppCommands;
pub use github::GithubCommands;
pub use projects::ProjectCommands;
