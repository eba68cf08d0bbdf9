//! Login lockout configuration
//!
//! Configures the failure threshold and where banned clients are sent.

use serde::{Deserialize, Serialize};

/// Login lockout configuration
///
/// # Example (config.toml)
///
/// ```toml
/// [lockout]
/// threshold = 3
/// ban_redirect = "https://www.google.com"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LockoutConfig {
    /// Consecutive failed credential checks that ban an address
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Where banned clients are redirected
    ///
    /// The same redirect answers both pre-existing bans and the failure that
    /// triggers a new one, so a client cannot tell it was blocked.
    #[serde(default = "default_ban_redirect")]
    pub ban_redirect: String,
}

impl LockoutConfig {
    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.threshold == 0 {
            return Err("lockout.threshold must be greater than 0".to_string());
        }
        if self.ban_redirect.trim().is_empty() {
            return Err("lockout.ban_redirect must not be empty".to_string());
        }
        if self.ban_redirect.contains(char::is_whitespace) {
            return Err("lockout.ban_redirect must not contain whitespace".to_string());
        }
        Ok(())
    }

    /// Set the failure threshold
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            ban_redirect: default_ban_redirect(),
        }
    }
}

fn default_threshold() -> u32 {
    3
}

fn default_ban_redirect() -> String {
    "https://www.google.com".to_string()
}
