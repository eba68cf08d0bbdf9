//! Login lockout service
//!
//! Counts consecutive failed credential checks per client address and bans an
//! address once the count reaches the configured threshold. Counters live in
//! memory only: a restart forgives partial progress for every address, while
//! bans persist through the [`AccessStore`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::LockoutConfig;
use crate::error::Result;
use crate::store::{AccessStore, ApprovalRecord, BanRecord};

/// Result of feeding a credential check into the lockout state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted; counter reset
    Approved {
        /// Whether this login created the address's approval record
        first_approval: bool,
    },
    /// Credentials rejected, address still below the threshold
    Retry {
        /// Consecutive failures so far, including this one
        attempt: u32,
        /// Failures that trigger a ban
        threshold: u32,
    },
    /// Address is banned, either by this failure or earlier
    Banned,
}

/// Login lockout service
///
/// Construct once at startup and share through the application state. Every
/// address gets its own async mutex; the counter update and the ban write for
/// an address happen under that mutex, so concurrent failures can neither
/// skip the threshold nor write a second ban record.
///
/// # Example
///
/// ```rust,ignore
/// let lockout = LoginLockout::new(config.lockout.clone(), store);
///
/// let outcome = if credentials_ok {
///     lockout.record_success(&address, user_agent, Some(username)).await?
/// } else {
///     lockout.record_failure(&address, user_agent).await?
/// };
/// ```
#[derive(Clone)]
pub struct LoginLockout {
    config: LockoutConfig,
    store: Arc<dyn AccessStore>,
    counters: Arc<DashMap<String, Arc<Mutex<u32>>>>,
}

impl LoginLockout {
    /// Create a new login lockout service
    pub fn new(config: LockoutConfig, store: Arc<dyn AccessStore>) -> Self {
        Self {
            config,
            store,
            counters: Arc::new(DashMap::new()),
        }
    }

    /// The lockout configuration
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Whether the address is banned
    ///
    /// A store error counts as "not banned": the gate fails open rather than
    /// locking every client out.
    pub async fn is_banned(&self, address: &str) -> bool {
        match self.store.is_banned(address).await {
            Ok(banned) => banned,
            Err(e) => {
                warn!(address = address, error = %e, "Ban lookup failed, allowing request");
                false
            }
        }
    }

    /// Current consecutive failure count for an address
    pub async fn attempts(&self, address: &str) -> u32 {
        let slot = self.counters.get(address).map(|entry| Arc::clone(entry.value()));
        match slot {
            Some(slot) => *slot.lock().await,
            None => 0,
        }
    }

    /// Record a failed credential check
    ///
    /// Increments the address's counter. Reaching the threshold writes a ban
    /// record carrying the client signature and returns [`LoginOutcome::Banned`].
    pub async fn record_failure(
        &self,
        address: &str,
        client_signature: Option<String>,
    ) -> Result<LoginOutcome> {
        let slot = self.slot(address);
        let mut count = slot.lock().await;

        // A racing request may have banned the address while we waited
        if self.store.is_banned(address).await? {
            return Ok(LoginOutcome::Banned);
        }

        *count += 1;
        let attempt = *count;

        debug!(
            address = address,
            attempt = attempt,
            threshold = self.config.threshold,
            "Login failure recorded"
        );

        if attempt < self.config.threshold {
            return Ok(LoginOutcome::Retry {
                attempt,
                threshold: self.config.threshold,
            });
        }

        if self
            .store
            .record_ban(BanRecord::new(address, client_signature))
            .await?
        {
            warn!(
                address = address,
                attempt = attempt,
                "Address banned after repeated login failures"
            );
        }

        drop(count);
        self.release(address, slot);
        Ok(LoginOutcome::Banned)
    }

    /// Record a successful credential check
    ///
    /// Resets the counter and writes an approval record on the address's
    /// first successful login. An address banned while the check ran stays
    /// banned and gets no approval.
    pub async fn record_success(
        &self,
        address: &str,
        client_signature: Option<String>,
        identity: Option<String>,
    ) -> Result<LoginOutcome> {
        let slot = self.slot(address);
        let mut count = slot.lock().await;

        if self.store.is_banned(address).await? {
            return Ok(LoginOutcome::Banned);
        }
        *count = 0;

        let first_approval = if self.store.is_approved(address).await? {
            false
        } else {
            self.store
                .record_approval(ApprovalRecord::new(address, client_signature, identity))
                .await?
        };

        if first_approval {
            info!(address = address, "Address approved on first successful login");
        }

        drop(count);
        self.release(address, slot);
        Ok(LoginOutcome::Approved { first_approval })
    }

    /// Ban an address immediately, bypassing the counter
    ///
    /// Used when a login proves the client is not the authorized principal
    /// (for example an OAuth identity mismatch). Returns whether a new ban
    /// record was written.
    pub async fn ban(&self, address: &str, client_signature: Option<String>) -> Result<bool> {
        let slot = self.slot(address);
        let guard = slot.lock().await;

        let written = self
            .store
            .record_ban(BanRecord::new(address, client_signature))
            .await?;
        if written {
            warn!(address = address, "Address banned");
        }

        drop(guard);
        self.release(address, slot);
        Ok(written)
    }

    /// Get or create the per-address counter slot
    fn slot(&self, address: &str) -> Arc<Mutex<u32>> {
        Arc::clone(self.counters.entry(address.to_string()).or_default().value())
    }

    /// Drop the slot from the map once nobody else holds or awaits it
    ///
    /// Only zeroed or banned slots are released, so no count is lost.
    fn release(&self, address: &str, slot: Arc<Mutex<u32>>) {
        drop(slot);
        self.counters
            .remove_if(address, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccessKind, MemoryAccessStore};

    fn lockout() -> (LoginLockout, Arc<MemoryAccessStore>) {
        let store = Arc::new(MemoryAccessStore::new());
        let lockout = LoginLockout::new(LockoutConfig::default(), store.clone());
        (lockout, store)
    }

    #[tokio::test]
    async fn test_threshold_failures_ban_address() {
        let (lockout, store) = lockout();

        assert_eq!(
            lockout.record_failure("10.0.0.5", None).await.unwrap(),
            LoginOutcome::Retry {
                attempt: 1,
                threshold: 3
            }
        );
        assert_eq!(
            lockout.record_failure("10.0.0.5", None).await.unwrap(),
            LoginOutcome::Retry {
                attempt: 2,
                threshold: 3
            }
        );
        assert_eq!(
            lockout
                .record_failure("10.0.0.5", Some("curl/8.0".into()))
                .await
                .unwrap(),
            LoginOutcome::Banned
        );

        assert!(lockout.is_banned("10.0.0.5").await);
        let bans = store.list(AccessKind::Ban).await.unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].address(), "10.0.0.5");
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let (lockout, store) = lockout();

        lockout.record_failure("10.0.0.7", None).await.unwrap();
        lockout.record_failure("10.0.0.7", None).await.unwrap();
        assert_eq!(lockout.attempts("10.0.0.7").await, 2);

        let outcome = lockout
            .record_success("10.0.0.7", None, Some("admin".into()))
            .await
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Approved { first_approval: true });
        assert_eq!(lockout.attempts("10.0.0.7").await, 0);
        assert!(store.is_approved("10.0.0.7").await.unwrap());

        assert_eq!(
            lockout.record_failure("10.0.0.7", None).await.unwrap(),
            LoginOutcome::Retry {
                attempt: 1,
                threshold: 3
            }
        );
    }

    #[tokio::test]
    async fn test_second_success_does_not_duplicate_approval() {
        let (lockout, store) = lockout();

        lockout.record_success("10.0.0.8", None, None).await.unwrap();
        let outcome = lockout.record_success("10.0.0.8", None, None).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Approved { first_approval: false });
        assert_eq!(store.list(AccessKind::Approval).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counters_are_per_address() {
        let (lockout, _) = lockout();

        lockout.record_failure("10.0.0.1", None).await.unwrap();
        lockout.record_failure("10.0.0.1", None).await.unwrap();
        assert_eq!(
            lockout.record_failure("10.0.0.2", None).await.unwrap(),
            LoginOutcome::Retry {
                attempt: 1,
                threshold: 3
            }
        );
    }

    #[tokio::test]
    async fn test_failure_after_ban_stays_banned() {
        let (lockout, store) = lockout();
        for _ in 0..3 {
            lockout.record_failure("10.0.0.5", None).await.unwrap();
        }
        assert_eq!(
            lockout.record_failure("10.0.0.5", None).await.unwrap(),
            LoginOutcome::Banned
        );
        assert_eq!(store.list(AccessKind::Ban).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_write_exactly_one_ban() {
        let (lockout, store) = lockout();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let lockout = lockout.clone();
            handles.push(tokio::spawn(async move {
                lockout.record_failure("10.0.0.66", None).await.unwrap()
            }));
        }

        let mut retries = Vec::new();
        let mut banned = 0;
        for handle in handles {
            match handle.await.unwrap() {
                LoginOutcome::Retry { attempt, .. } => retries.push(attempt),
                LoginOutcome::Banned => banned += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        retries.sort_unstable();
        assert_eq!(retries, vec![1, 2]);
        assert_eq!(banned, 30);
        assert_eq!(store.list(AccessKind::Ban).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_success_after_ban_is_refused() {
        let (lockout, store) = lockout();
        for _ in 0..3 {
            lockout.record_failure("10.0.0.5", None).await.unwrap();
        }

        assert_eq!(
            lockout
                .record_success("10.0.0.5", None, Some("p4rge".into()))
                .await
                .unwrap(),
            LoginOutcome::Banned
        );
        assert!(!store.is_approved("10.0.0.5").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_success_racing_a_ban_never_approves_a_banned_address() {
        let (lockout, store) = lockout();
        lockout.record_failure("10.0.0.77", None).await.unwrap();
        lockout.record_failure("10.0.0.77", None).await.unwrap();

        let failing = {
            let lockout = lockout.clone();
            tokio::spawn(async move { lockout.record_failure("10.0.0.77", None).await.unwrap() })
        };
        let succeeding = {
            let lockout = lockout.clone();
            tokio::spawn(async move {
                lockout
                    .record_success("10.0.0.77", None, Some("p4rge".into()))
                    .await
                    .unwrap()
            })
        };
        let failure = failing.await.unwrap();
        let success = succeeding.await.unwrap();

        let banned = store.is_banned("10.0.0.77").await.unwrap();
        let approved = store.is_approved("10.0.0.77").await.unwrap();
        match success {
            // Success ran first: counter reset, so the failure only retries
            LoginOutcome::Approved { .. } => {
                assert!(approved);
                assert!(matches!(failure, LoginOutcome::Retry { attempt: 1, .. }));
                assert!(!banned);
            }
            LoginOutcome::Banned => {
                assert_eq!(failure, LoginOutcome::Banned);
                assert!(banned);
                assert!(!approved);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_immediate_ban() {
        let (lockout, store) = lockout();
        assert!(lockout.ban("172.16.0.3", Some("Mozilla/5.0".into())).await.unwrap());
        assert!(!lockout.ban("172.16.0.3", None).await.unwrap());
        assert!(lockout.is_banned("172.16.0.3").await);
        assert_eq!(store.list(AccessKind::Ban).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let store = Arc::new(MemoryAccessStore::new());
        let lockout = LoginLockout::new(LockoutConfig::default().with_threshold(1), store);
        assert_eq!(
            lockout.record_failure("10.0.0.9", None).await.unwrap(),
            LoginOutcome::Banned
        );
    }
}
