//! # gatehouse
//!
//! Access control for a single-tenant web portal.
//!
//! ## Features
//!
//! - **Brute-force lockout**: consecutive failed logins per client address;
//!   the third bans the address
//! - **Persisted ban/approval store**: JSON documents on disk, fail-open on
//!   unreadable files
//! - **Request gate**: ban check, route classification, and authentication
//!   before any handler runs
//! - **Session and connection tracking**: bounded connection log, live
//!   sessions, verified addresses, exposed through `/stats`
//! - **Credential or GitHub OAuth login** with a single authorized identity
//! - **Fault log**: every internal error and handler panic as one JSON line
//! - **Graceful shutdown**: SIGTERM and SIGINT drain connections, then
//!   subsystems are stopped and the store flushed
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder(config).build().await?;
//!     Server::new(state).serve().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod collab;
pub mod config;
pub mod error;
pub mod fault;
pub mod gate;
pub mod handlers;
pub mod lockout;
pub mod observability;
pub mod router;
pub mod security;
pub mod server;
pub mod session;
pub mod state;
pub mod stats;
pub mod store;
pub mod tracker;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AuthMode, Config};
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::fault::{FaultLog, FaultRecord};
    pub use crate::gate::{ClientAddress, Principal};
    pub use crate::lockout::{LoginLockout, LoginOutcome};
    pub use crate::observability::init_tracing;
    pub use crate::router::build_router;
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::store::{AccessKind, AccessRecord, AccessStore, FileAccessStore};
}
