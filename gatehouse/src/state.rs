//! Application state management

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::Authenticator;
use crate::collab::{
    FileStorage, LocalFileStorage, PageRenderer, ProcessSupervisor, SubsystemSupervisor,
    TemplatePageRenderer,
};
use crate::config::Config;
use crate::error::Result;
use crate::fault::FaultLog;
use crate::security::SecurityContext;
use crate::stats::{host_address, HostMetrics};
use crate::store::AccessStore;

/// Application state shared across handlers
///
/// Cheap to clone: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    security: Arc<SecurityContext>,
    authenticator: Authenticator,
    renderer: Arc<dyn PageRenderer>,
    files: Arc<dyn FileStorage>,
    subsystems: Arc<dyn SubsystemSupervisor>,
    metrics: Arc<HostMetrics>,
    fault_log: Arc<FaultLog>,
    host: IpAddr,
    started_at: Instant,
}

impl AppState {
    /// Create a new builder for AppState
    pub fn builder(config: Config) -> AppStateBuilder {
        AppStateBuilder::new(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Access-control state
    pub fn security(&self) -> &Arc<SecurityContext> {
        &self.security
    }

    /// Configured login method
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Page renderer
    pub fn renderer(&self) -> &dyn PageRenderer {
        self.renderer.as_ref()
    }

    /// File storage
    pub fn files(&self) -> &dyn FileStorage {
        self.files.as_ref()
    }

    /// Subsystem supervisor
    pub fn subsystems(&self) -> &dyn SubsystemSupervisor {
        self.subsystems.as_ref()
    }

    /// Host metrics sampler
    pub fn metrics(&self) -> &HostMetrics {
        &self.metrics
    }

    /// Fault log
    pub fn fault_log(&self) -> &Arc<FaultLog> {
        &self.fault_log
    }

    /// Address this host is reachable at
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Time since the state was built
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Release resources held by the state; called once at shutdown
    pub async fn shutdown(&self) {
        self.subsystems.shutdown().await;
        if let Err(e) = self.security.shutdown().await {
            tracing::error!(error = %e, "Failed to flush access store on shutdown");
        }
    }
}

/// Builder for AppState
///
/// Anything not supplied is built from the configuration: the file-backed
/// store, the configured authenticator, local file storage, the process
/// supervisor, and the fault log.
pub struct AppStateBuilder {
    config: Config,
    store: Option<Arc<dyn AccessStore>>,
    authenticator: Option<Authenticator>,
    renderer: Option<Arc<dyn PageRenderer>>,
    files: Option<Arc<dyn FileStorage>>,
    subsystems: Option<Arc<dyn SubsystemSupervisor>>,
    fault_log: Option<Arc<FaultLog>>,
    host: Option<IpAddr>,
}

impl AppStateBuilder {
    /// Create a builder for the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            authenticator: None,
            renderer: None,
            files: None,
            subsystems: None,
            fault_log: None,
            host: None,
        }
    }

    /// Use this ban/approval store instead of opening the configured files
    pub fn store(mut self, store: Arc<dyn AccessStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this authenticator instead of the configured one
    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Set the page renderer
    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the file storage
    pub fn files(mut self, files: Arc<dyn FileStorage>) -> Self {
        self.files = Some(files);
        self
    }

    /// Set the subsystem supervisor
    pub fn subsystems(mut self, subsystems: Arc<dyn SubsystemSupervisor>) -> Self {
        self.subsystems = Some(subsystems);
        self
    }

    /// Set the fault log
    pub fn fault_log(mut self, fault_log: Arc<FaultLog>) -> Self {
        self.fault_log = Some(fault_log);
        self
    }

    /// Override the reported host address
    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = Some(host);
        self
    }

    /// Build the AppState
    pub async fn build(self) -> Result<AppState> {
        let config = self.config;
        config.validate()?;

        let security = match self.store {
            Some(store) => SecurityContext::new(&config, store),
            None => SecurityContext::open(&config).await?,
        };

        let authenticator = match self.authenticator {
            Some(authenticator) => authenticator,
            None => Authenticator::from_config(&config.auth).await?,
        };

        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(TemplatePageRenderer::new(config.service.name.clone())));
        let files = self
            .files
            .unwrap_or_else(|| Arc::new(LocalFileStorage::new(config.files.dir.clone())));
        let subsystems = self
            .subsystems
            .unwrap_or_else(|| Arc::new(ProcessSupervisor::new(&config.subsystems)));
        let fault_log = self
            .fault_log
            .unwrap_or_else(|| Arc::new(FaultLog::from_config(&config.fault_log)));
        let host = self.host.unwrap_or_else(host_address);

        tracing::info!(
            auth_mode = %authenticator.mode(),
            threshold = config.lockout.threshold,
            subsystems = config.subsystems.len(),
            "Application state ready"
        );

        Ok(AppState {
            config: Arc::new(config),
            security: Arc::new(security),
            authenticator,
            renderer,
            files,
            subsystems,
            metrics: Arc::new(HostMetrics::new()),
            fault_log,
            host,
            started_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialVerifier, PasswordHasher, PasswordParams};
    use crate::store::MemoryAccessStore;

    fn authenticator() -> Authenticator {
        let hasher = PasswordHasher::new(PasswordParams {
            memory_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
            min_password_length: 8,
        })
        .unwrap();
        let hash = hasher.hash("ctrl_z_000").unwrap();
        Authenticator::Credentials(CredentialVerifier::new("p4rge", hash, hasher).unwrap())
    }

    #[tokio::test]
    async fn test_state_builder() {
        let state = AppState::builder(Config::default())
            .store(Arc::new(MemoryAccessStore::new()))
            .authenticator(authenticator())
            .fault_log(Arc::new(FaultLog::disabled()))
            .host("192.168.1.10".parse().unwrap())
            .build()
            .await
            .unwrap();

        assert_eq!(state.config().service.port, 4000);
        assert_eq!(state.host().to_string(), "192.168.1.10");
        assert!(state.fault_log().path().is_none());
    }

    #[tokio::test]
    async fn test_credentials_mode_requires_settings() {
        let result = AppState::builder(Config::default())
            .store(Arc::new(MemoryAccessStore::new()))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.tracker.capacity = 0;
        let result = AppState::builder(config)
            .store(Arc::new(MemoryAccessStore::new()))
            .authenticator(authenticator())
            .build()
            .await;
        assert!(result.is_err());
    }
}
