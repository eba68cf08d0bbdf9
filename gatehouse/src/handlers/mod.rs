//! Route handlers
//!
//! Every handler runs behind the request gate. Protected handlers can rely on
//! an authenticated [`Principal`](crate::gate::Principal) in the extensions.

pub mod auth;
pub mod files;
pub mod pages;
pub mod status;
pub mod subsystems;

pub use status::{StatsResponse, StatusResponse};
