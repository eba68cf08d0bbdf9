//! Session and connection tracker
//!
//! Live telemetry for the stats endpoint: a bounded rolling log of every
//! request that passed the ban check, the current authenticated sessions, and
//! every address that authenticated during this process lifetime. Nothing here
//! is persisted and nothing here is consulted for access decisions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::TrackerConfig;

/// One request in the rolling connection log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionLogEntry {
    /// Client address
    #[serde(rename = "ip")]
    pub address: String,
    /// Arrival time
    pub timestamp: DateTime<Utc>,
    /// Request path
    pub path: String,
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Session identifier
    pub session_id: String,
    /// Client address
    #[serde(rename = "ip")]
    pub address: String,
    /// Authenticated identity
    #[serde(rename = "login")]
    pub identity: String,
    /// When the session authenticated
    pub login_time: DateTime<Utc>,
    /// Most recent path requested by the session
    pub last_path: String,
    /// Time of the most recent request from the session
    pub last_seen: DateTime<Utc>,
}

/// An address that authenticated at least once since startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAddressEntry {
    /// Client address
    #[serde(rename = "ip")]
    pub address: String,
    /// Identity of the most recent login from the address
    #[serde(rename = "login")]
    pub identity: String,
    /// Time of the most recent login from the address
    pub login_time: DateTime<Utc>,
    /// Most recent path requested from the address
    pub last_path: String,
}

/// Point-in-time copy of the tracker state
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerSnapshot {
    /// Most recent log entries, oldest first
    pub connections: Vec<ConnectionLogEntry>,
    /// Authenticated sessions
    pub sessions: Vec<SessionEntry>,
    /// Addresses that authenticated since startup
    pub verified: Vec<VerifiedAddressEntry>,
}

#[derive(Default)]
struct TrackerState {
    log: VecDeque<ConnectionLogEntry>,
    sessions: HashMap<String, SessionEntry>,
    verified: HashMap<String, VerifiedAddressEntry>,
}

/// Session/connection tracker
///
/// All three structures sit behind one mutex. Critical sections are short and
/// never cross an await point, so a blocking mutex is used.
pub struct ConnectionTracker {
    capacity: usize,
    session_idle: Option<Duration>,
    state: Mutex<TrackerState>,
}

impl ConnectionTracker {
    /// Create a tracker keeping at most `capacity` log entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            session_idle: None,
            state: Mutex::new(TrackerState {
                log: VecDeque::with_capacity(capacity.clamp(1, 4096)),
                ..Default::default()
            }),
        }
    }

    /// Create a tracker from configuration
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Forget sessions with no request for longer than `idle`
    ///
    /// Matches the session cookie's inactivity expiry, so a client that never
    /// comes back does not stay listed forever.
    pub fn with_session_idle(mut self, idle: Option<Duration>) -> Self {
        self.session_idle = idle;
        self
    }

    /// Maximum number of log entries kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a request to the connection log, evicting the oldest beyond capacity
    pub fn record_request(&self, address: &str, path: &str, timestamp: DateTime<Utc>) {
        let mut state = self.lock();
        state.log.push_back(ConnectionLogEntry {
            address: address.to_string(),
            timestamp,
            path: path.to_string(),
        });
        while state.log.len() > self.capacity {
            state.log.pop_front();
        }
    }

    /// Upsert the session and verified-address entries for an authenticated request
    ///
    /// The session entry is skipped when the request carries no session (for
    /// example an approved address without a cookie).
    pub fn record_authenticated(
        &self,
        session_id: Option<&str>,
        address: &str,
        identity: &str,
        login_time: DateTime<Utc>,
        path: &str,
    ) {
        let now = Utc::now();
        let mut state = self.lock();
        self.expire_idle(&mut state, now);

        if let Some(session_id) = session_id {
            state.sessions.insert(
                session_id.to_string(),
                SessionEntry {
                    session_id: session_id.to_string(),
                    address: address.to_string(),
                    identity: identity.to_string(),
                    login_time,
                    last_path: path.to_string(),
                    last_seen: now,
                },
            );
        }

        state.verified.insert(
            address.to_string(),
            VerifiedAddressEntry {
                address: address.to_string(),
                identity: identity.to_string(),
                login_time,
                last_path: path.to_string(),
            },
        );
    }

    /// Drop the session entry; returns whether one existed
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.lock().sessions.remove(session_id).is_some()
    }

    /// Drop sessions idle past the configured limit; returns how many were dropped
    pub fn expire_idle_sessions(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        self.expire_idle(&mut state, now)
    }

    fn expire_idle(&self, state: &mut TrackerState, now: DateTime<Utc>) -> usize {
        let Some(idle) = self.session_idle else {
            return 0;
        };
        let before = state.sessions.len();
        state.sessions.retain(|_, entry| now - entry.last_seen <= idle);
        before - state.sessions.len()
    }

    /// Number of entries currently in the connection log
    pub fn log_len(&self) -> usize {
        self.lock().log.len()
    }

    /// Copy the current state, keeping only the newest `tail` log entries
    pub fn snapshot(&self, tail: usize) -> TrackerSnapshot {
        let mut state = self.lock();
        self.expire_idle(&mut state, Utc::now());
        let skip = state.log.len().saturating_sub(tail);

        let mut sessions: Vec<SessionEntry> = state.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.login_time.cmp(&b.login_time));
        let mut verified: Vec<VerifiedAddressEntry> = state.verified.values().cloned().collect();
        verified.sort_by(|a, b| a.address.cmp(&b.address));

        TrackerSnapshot {
            connections: state.log.iter().skip(skip).cloned().collect(),
            sessions,
            verified,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Telemetry only: a panic mid-update leaves nothing worth refusing to read
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_log_is_bounded_fifo() {
        let tracker = ConnectionTracker::new(1000);
        let now = Utc::now();
        for i in 0..1001 {
            tracker.record_request("10.0.0.1", &format!("/req/{}", i), now);
        }

        assert_eq!(tracker.log_len(), 1000);
        let snapshot = tracker.snapshot(1000);
        assert_eq!(snapshot.connections.len(), 1000);
        assert_eq!(snapshot.connections[0].path, "/req/1");
        assert_eq!(snapshot.connections[999].path, "/req/1000");
        assert!(snapshot.connections.iter().all(|c| c.path != "/req/0"));
    }

    #[test]
    fn test_snapshot_tail() {
        let tracker = ConnectionTracker::new(10);
        let now = Utc::now();
        for i in 0..5 {
            tracker.record_request("10.0.0.1", &format!("/{}", i), now);
        }
        let paths: Vec<String> = tracker
            .snapshot(2)
            .connections
            .into_iter()
            .map(|c| c.path)
            .collect();
        assert_eq!(paths, vec!["/3", "/4"]);
    }

    #[test]
    fn test_authenticated_upsert_and_clear() {
        let tracker = ConnectionTracker::new(10);
        let login = Utc::now();

        tracker.record_authenticated(Some("sid-1"), "10.0.0.2", "octocat", login, "/");
        tracker.record_authenticated(Some("sid-1"), "10.0.0.2", "octocat", login, "/files");

        let snapshot = tracker.snapshot(10);
        assert_eq!(snapshot.sessions.len(), 1);
        assert_eq!(snapshot.sessions[0].last_path, "/files");
        assert_eq!(snapshot.verified.len(), 1);

        assert!(tracker.clear_session("sid-1"));
        assert!(!tracker.clear_session("sid-1"));

        // Verified addresses outlive their sessions
        let snapshot = tracker.snapshot(10);
        assert!(snapshot.sessions.is_empty());
        assert_eq!(snapshot.verified[0].address, "10.0.0.2");
    }

    #[test]
    fn test_idle_sessions_expire() {
        let tracker = ConnectionTracker::new(10).with_session_idle(Some(Duration::seconds(60)));
        tracker.record_authenticated(Some("sid-1"), "10.0.0.2", "octocat", Utc::now(), "/");

        assert_eq!(tracker.expire_idle_sessions(Utc::now()), 0);
        assert_eq!(tracker.snapshot(10).sessions.len(), 1);

        let later = Utc::now() + Duration::seconds(61);
        assert_eq!(tracker.expire_idle_sessions(later), 1);
        let snapshot = tracker.snapshot(10);
        assert!(snapshot.sessions.is_empty());
        assert_eq!(snapshot.verified.len(), 1);
    }

    #[test]
    fn test_sessions_kept_without_idle_limit() {
        let tracker = ConnectionTracker::new(10);
        tracker.record_authenticated(Some("sid-1"), "10.0.0.2", "octocat", Utc::now(), "/");
        assert_eq!(tracker.expire_idle_sessions(Utc::now() + Duration::days(365)), 0);
    }

    #[test]
    fn test_verified_is_last_write_wins() {
        let tracker = ConnectionTracker::new(10);
        let first = Utc::now();
        let second = first + Duration::seconds(30);

        tracker.record_authenticated(None, "10.0.0.3", "admin", first, "/");
        tracker.record_authenticated(None, "10.0.0.3", "admin", second, "/notes");

        let snapshot = tracker.snapshot(10);
        assert!(snapshot.sessions.is_empty());
        assert_eq!(snapshot.verified.len(), 1);
        assert_eq!(snapshot.verified[0].login_time, second);
        assert_eq!(snapshot.verified[0].last_path, "/notes");
    }

    #[test]
    fn test_entries_serialize_with_portal_field_names() {
        let tracker = ConnectionTracker::new(10);
        tracker.record_authenticated(Some("sid"), "10.0.0.4", "admin", Utc::now(), "/todos");
        let json = serde_json::to_value(tracker.snapshot(10)).unwrap();
        let session = &json["sessions"][0];
        assert_eq!(session["ip"], "10.0.0.4");
        assert_eq!(session["login"], "admin");
        assert_eq!(session["lastPath"], "/todos");
        assert!(session.get("loginTime").is_some());
        assert!(session.get("lastSeen").is_some());
    }

    #[test]
    fn test_concurrent_requests_respect_capacity() {
        let tracker = Arc::new(ConnectionTracker::new(100));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        tracker.record_request(&format!("10.0.{}.{}", t, i), "/", Utc::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.log_len(), 100);
    }
}
