//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: the single source of truth for the signed-in user and
//!   their access/refresh tokens
//! - `SessionStorage`: durable backends (`FileStorage`, `KeyringStorage`,
//!   `MemoryStorage`) so a session survives a restart
//!
//! The store is created once per process and shared as `Arc<SessionStore>`.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use session::{AuthTokens, LogoutReason, SessionEvent, SessionState, SessionStore, User};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
