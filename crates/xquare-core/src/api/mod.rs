//! REST API client module for the xquare platform.
//!
//! This module provides the `ApiClient` for managing projects, applications,
//! addons and GitHub installations.
//!
//! Requests go through the `RequestPipeline`, which attaches the bearer
//! token from the `SessionStore` and refreshes it once when the server
//! answers `401 Unauthorized`.

pub mod client;
pub mod error;
pub mod pipeline;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use pipeline::RequestPipeline;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport};
