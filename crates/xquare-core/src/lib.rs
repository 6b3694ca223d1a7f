//! Core library for the xquare deployment platform client.
//!
//! - `auth`: the session store and its persistence backends
//! - `api`: the authenticated request pipeline and the typed REST client
//! - `models`: projects, applications, addons and GitHub records
//! - `config`: user configuration and directory layout

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionState, SessionStore};
pub use config::Config;
