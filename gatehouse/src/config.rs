//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `GATEHOUSE_`, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/gatehouse/config.toml
//! 4. System directory: /etc/gatehouse/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lockout::LockoutConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Brute-force lockout configuration
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// Ban/approval store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Session/connection tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Session cookie configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability endpoint configuration
    #[serde(default)]
    pub stats: StatsConfig,

    /// Structured fault log configuration
    #[serde(default)]
    pub fault_log: FaultLogConfig,

    /// Uploaded file storage
    #[serde(default)]
    pub files: FilesConfig,

    /// Externally managed child processes
    #[serde(default)]
    pub subsystems: Vec<SubsystemConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum request body size in megabytes
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// CORS mode: "permissive", "restrictive", or "disabled"
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,

    /// Use the first `X-Forwarded-For` hop as the client address
    ///
    /// Only enable behind a reverse proxy that overwrites the header,
    /// otherwise clients can pick their own lockout key.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// Ban/approval store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the store documents
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,

    /// File name of the ban document
    #[serde(default = "default_bans_file")]
    pub bans_file: String,

    /// File name of the approval document
    #[serde(default = "default_approvals_file")]
    pub approvals_file: String,

    /// Treat an unreadable or corrupt document as empty instead of refusing to start
    #[serde(default = "default_true")]
    pub fail_open: bool,
}

/// Session/connection tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Maximum number of entries kept in the rolling connection log
    #[serde(default = "default_tracker_capacity")]
    pub capacity: usize,

    /// Number of most recent log entries returned by the stats endpoint
    #[serde(default = "default_stats_tail")]
    pub stats_tail: usize,
}

/// How the single protected principal proves itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Shared username/password submitted through the login form
    #[default]
    Credentials,
    /// GitHub OAuth with a single authorized account
    Github,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials => write!(f, "credentials"),
            Self::Github => write!(f, "github"),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authentication mode
    #[serde(default)]
    pub mode: AuthMode,

    /// Shared username (credentials mode)
    #[serde(default)]
    pub username: String,

    /// Argon2id PHC hash of the shared password (credentials mode)
    #[serde(default)]
    pub password_hash: String,

    /// Let an address holding an approval record through without a session
    #[serde(default = "default_true")]
    pub trust_approved_addresses: bool,

    /// GitHub OAuth settings (github mode)
    #[serde(default)]
    pub github: GithubConfig,
}

/// GitHub OAuth application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// OAuth client ID
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Callback URL registered with GitHub
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Deadline for each call to GitHub, in seconds
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,

    /// Document holding the sole authorized GitHub login
    #[serde(default = "default_authorized_user_file")]
    pub authorized_user_file: PathBuf,
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Secure cookie flag (HTTPS only)
    #[serde(default)]
    pub secure: bool,

    /// SameSite policy: "strict", "lax", or "none"
    #[serde(default = "default_same_site")]
    pub same_site: String,

    /// Inactivity expiry in seconds; 0 means the cookie ends with the browser session
    #[serde(default = "default_session_expiry")]
    pub expiry_secs: u64,
}

/// Observability endpoint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Serve `/stats` without authentication
    #[serde(default)]
    pub public: bool,
}

/// Structured fault log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultLogConfig {
    /// Write fault records to disk
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory receiving `error-<timestamp>.txt` files
    #[serde(default = "default_fault_dir")]
    pub dir: PathBuf,
}

/// Uploaded file storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Directory uploads are stored in
    #[serde(default = "default_files_dir")]
    pub dir: PathBuf,
}

/// A child process that can be started and stopped from the portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// Identifier used in routes
    pub id: String,

    /// Program to execute
    pub command: String,

    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            timeout_secs: default_timeout(),
            body_limit_mb: default_body_limit_mb(),
            cors_mode: default_cors_mode(),
            trust_forwarded_for: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            bans_file: default_bans_file(),
            approvals_file: default_approvals_file(),
            fail_open: true,
        }
    }
}

impl StoreConfig {
    /// Full path of the ban document
    pub fn bans_path(&self) -> PathBuf {
        self.dir.join(&self.bans_file)
    }

    /// Full path of the approval document
    pub fn approvals_path(&self) -> PathBuf {
        self.dir.join(&self.approvals_file)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capacity: default_tracker_capacity(),
            stats_tail: default_stats_tail(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            username: String::new(),
            password_hash: String::new(),
            trust_approved_addresses: true,
            github: GithubConfig::default(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            timeout_secs: default_github_timeout(),
            authorized_user_file: default_authorized_user_file(),
        }
    }
}

impl GithubConfig {
    /// Deadline applied to each outbound call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    /// Inactivity after which a session is gone; `None` when sessions end with the browser
    pub fn idle_limit(&self) -> Option<chrono::Duration> {
        (self.expiry_secs > 0).then(|| chrono::Duration::seconds(self.expiry_secs as i64))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure: false,
            same_site: default_same_site(),
            expiry_secs: default_session_expiry(),
        }
    }
}

impl Default for FaultLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_fault_dir(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            dir: default_files_dir(),
        }
    }
}

fn default_service_name() -> String {
    "gatehouse".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_true() -> bool {
    true
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_bans_file() -> String {
    "ban.json".to_string()
}

fn default_approvals_file() -> String {
    "approvals.json".to_string()
}

fn default_tracker_capacity() -> usize {
    1000
}

fn default_stats_tail() -> usize {
    100
}

fn default_redirect_uri() -> String {
    "http://localhost:4000/oauth-callback".to_string()
}

fn default_github_timeout() -> u64 {
    10
}

fn default_authorized_user_file() -> PathBuf {
    PathBuf::from("data/authorized_github_user.json")
}

fn default_cookie_name() -> String {
    "gatehouse_sid".to_string()
}

fn default_same_site() -> String {
    "lax".to_string()
}

fn default_session_expiry() -> u64 {
    86400 // 24 hours
}

fn default_fault_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found wins per key):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/gatehouse/config.toml
    /// 3. System directory: /etc/gatehouse/config.toml
    ///
    /// Environment variables (`GATEHOUSE_` prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config: Config = figment
            .merge(Env::prefixed("GATEHOUSE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the XDG and system directories. Environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GATEHOUSE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        self.lockout.validate().map_err(Error::InvalidConfig)?;

        if self.tracker.capacity == 0 {
            return Err(Error::InvalidConfig(
                "tracker.capacity must be greater than 0".to_string(),
            ));
        }
        if self.store.bans_file == self.store.approvals_file {
            return Err(Error::InvalidConfig(
                "store.bans_file and store.approvals_file must differ".to_string(),
            ));
        }
        if self.auth.mode == AuthMode::Github && self.auth.github.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "auth.github.timeout_secs must be greater than 0".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for subsystem in &self.subsystems {
            if !seen.insert(subsystem.id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate subsystem id '{}'",
                    subsystem.id
                )));
            }
        }

        Ok(())
    }

    /// Find all possible config file paths, highest priority first
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("gatehouse");
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc/gatehouse/config.toml"));
        paths
    }

    /// Get the recommended config path for this user
    ///
    /// Returns: ~/.config/gatehouse/config.toml
    pub fn recommended_path() -> PathBuf {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("gatehouse");
        xdg_dirs.place_config_file("config.toml").unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| String::from("~")))
                .join(".config/gatehouse/config.toml")
        })
    }

    /// Socket address string the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }
}
