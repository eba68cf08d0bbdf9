//! Brute-force lockout keyed by client address
//!
//! Per-address state machine:
//!
//! ```text
//! Clean (0) --fail--> Warned (1..threshold-1) --fail--> Banned
//!     ^                     |
//!     +------success--------+
//! ```
//!
//! `Banned` is terminal: the request gate rejects a banned address before any
//! credential is evaluated, and nothing in the server lifts a ban. Removal is
//! an administrative action (`gatehouse bans remove`).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gatehouse::lockout::{LoginLockout, LockoutConfig, LoginOutcome};
//!
//! let lockout = LoginLockout::new(LockoutConfig::default(), store);
//!
//! match lockout.record_failure(&address, user_agent).await? {
//!     LoginOutcome::Retry { attempt, threshold } => { /* "attempt 1 of 3" */ }
//!     LoginOutcome::Banned => { /* redirect away */ }
//!     LoginOutcome::Approved { .. } => unreachable!(),
//! }
//! ```

pub mod config;
pub mod service;

pub use config::LockoutConfig;
pub use service::{LoginLockout, LoginOutcome};
