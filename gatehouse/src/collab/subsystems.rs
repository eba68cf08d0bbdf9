//! Subsystem process control
//!
//! A subsystem is a configured command the portal can start and stop. The
//! supervisor owns the child handles; callers only ever see an id and a
//! [`SubsystemStatus`].

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::SubsystemConfig;
use crate::error::{Error, Result};

/// How long `stop` waits for a killed child to be reaped
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Whether a subsystem process is alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemState {
    /// Child is alive
    Running,
    /// Never started, stopped, or exited on its own
    Stopped,
}

/// Status report for one subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemStatus {
    /// Subsystem id
    pub id: String,
    /// Current state
    pub state: SubsystemState,
    /// OS process id while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Exit code of the last run, if it exited on its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl SubsystemStatus {
    fn stopped(id: &str, exit_code: Option<i32>) -> Self {
        Self {
            id: id.to_string(),
            state: SubsystemState::Stopped,
            pid: None,
            exit_code,
        }
    }
}

/// Start/stop/status capability over configured subsystems
#[async_trait]
pub trait SubsystemSupervisor: Send + Sync {
    /// Launch the subsystem; fails with `Conflict` if it is already running
    async fn start(&self, id: &str) -> Result<SubsystemStatus>;

    /// Terminate the subsystem if it is running
    async fn stop(&self, id: &str) -> Result<SubsystemStatus>;

    /// Report whether the subsystem is running
    async fn status(&self, id: &str) -> Result<SubsystemStatus>;

    /// Status of every configured subsystem, ordered by id
    async fn list(&self) -> Result<Vec<SubsystemStatus>>;

    /// Stop everything; called on shutdown
    async fn shutdown(&self);
}

/// Supervisor running subsystems as child processes
pub struct ProcessSupervisor {
    specs: HashMap<String, SubsystemConfig>,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessSupervisor {
    /// Create a supervisor for the configured subsystems
    pub fn new(specs: &[SubsystemConfig]) -> Self {
        Self {
            specs: specs
                .iter()
                .map(|spec| (spec.id.clone(), spec.clone()))
                .collect(),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn spec(&self, id: &str) -> Result<&SubsystemConfig> {
        self.specs
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("Unknown subsystem '{}'", id)))
    }

    fn spawn(spec: &SubsystemConfig) -> Result<Child> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        // Detach from the portal's terminal signals
        #[cfg(unix)]
        command.process_group(0);

        command.spawn().map_err(|e| {
            Error::Internal(format!(
                "Failed to start subsystem '{}' ({}): {}",
                spec.id, spec.command, e
            ))
        })
    }

    /// Kill the child and everything it spawned; the child leads its own group
    #[cfg(unix)]
    #[allow(clippy::cast_possible_wrap)]
    fn kill(id: &str, child: &mut Child) -> Result<()> {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => return Ok(()),
                Err(e) => warn!(subsystem = id, error = %e, "Failed to signal process group"),
            }
        }
        Self::kill_child(id, child)
    }

    #[cfg(not(unix))]
    fn kill(id: &str, child: &mut Child) -> Result<()> {
        Self::kill_child(id, child)
    }

    fn kill_child(id: &str, child: &mut Child) -> Result<()> {
        child
            .start_kill()
            .map_err(|e| Error::Internal(format!("Failed to stop subsystem '{}': {}", id, e)))
    }

    /// Poll a child; `Some(code)` when it has exited
    fn poll(id: &str, child: &mut Child) -> Option<Option<i32>> {
        match child.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            Ok(None) => None,
            Err(e) => {
                warn!(subsystem = id, error = %e, "Failed to poll subsystem, treating as stopped");
                Some(None)
            }
        }
    }
}

#[async_trait]
impl SubsystemSupervisor for ProcessSupervisor {
    async fn start(&self, id: &str) -> Result<SubsystemStatus> {
        let spec = self.spec(id)?;
        let mut children = self.children.lock().await;

        if let Some(child) = children.get_mut(id) {
            if Self::poll(id, child).is_none() {
                return Err(Error::Conflict(format!("Subsystem '{}' is already running", id)));
            }
        }

        let child = Self::spawn(spec)?;
        let pid = child.id();
        children.insert(id.to_string(), child);
        info!(subsystem = id, pid = ?pid, "Subsystem started");

        Ok(SubsystemStatus {
            id: id.to_string(),
            state: SubsystemState::Running,
            pid,
            exit_code: None,
        })
    }

    async fn stop(&self, id: &str) -> Result<SubsystemStatus> {
        self.spec(id)?;
        let Some(mut child) = self.children.lock().await.remove(id) else {
            return Ok(SubsystemStatus::stopped(id, None));
        };

        if let Some(exit_code) = Self::poll(id, &mut child) {
            return Ok(SubsystemStatus::stopped(id, exit_code));
        }

        Self::kill(id, &mut child)?;
        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(Ok(_)) => info!(subsystem = id, "Subsystem stopped"),
            Ok(Err(e)) => warn!(subsystem = id, error = %e, "Failed to reap subsystem"),
            Err(_) => warn!(subsystem = id, "Subsystem did not exit within grace period"),
        }

        Ok(SubsystemStatus::stopped(id, None))
    }

    async fn status(&self, id: &str) -> Result<SubsystemStatus> {
        self.spec(id)?;
        let mut children = self.children.lock().await;

        let Some(child) = children.get_mut(id) else {
            return Ok(SubsystemStatus::stopped(id, None));
        };

        match Self::poll(id, child) {
            None => Ok(SubsystemStatus {
                id: id.to_string(),
                state: SubsystemState::Running,
                pid: child.id(),
                exit_code: None,
            }),
            Some(exit_code) => {
                children.remove(id);
                info!(subsystem = id, exit_code = ?exit_code, "Subsystem exited on its own");
                Ok(SubsystemStatus::stopped(id, exit_code))
            }
        }
    }

    async fn list(&self) -> Result<Vec<SubsystemStatus>> {
        let mut ids: Vec<&String> = self.specs.keys().collect();
        ids.sort();

        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            statuses.push(self.status(id).await?);
        }
        Ok(statuses)
    }

    async fn shutdown(&self) {
        let ids: Vec<String> = self.children.lock().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                warn!(subsystem = %id, error = %e, "Failed to stop subsystem on shutdown");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(&[
            SubsystemConfig {
                id: "sleeper".to_string(),
                command: "sleep".to_string(),
                args: vec!["30".to_string()],
                working_dir: None,
            },
            SubsystemConfig {
                id: "crasher".to_string(),
                command: "sh".to_string(),
                args: vec!["-c".to_string(), "exit 3".to_string()],
                working_dir: None,
            },
        ])
    }

    #[tokio::test]
    async fn test_start_status_stop() {
        let supervisor = supervisor();
        assert_eq!(
            supervisor.status("sleeper").await.unwrap().state,
            SubsystemState::Stopped
        );

        let started = supervisor.start("sleeper").await.unwrap();
        assert_eq!(started.state, SubsystemState::Running);
        assert!(started.pid.is_some());
        assert_eq!(
            supervisor.status("sleeper").await.unwrap().state,
            SubsystemState::Running
        );

        assert!(matches!(
            supervisor.start("sleeper").await,
            Err(Error::Conflict(_))
        ));

        let stopped = supervisor.stop("sleeper").await.unwrap();
        assert_eq!(stopped.state, SubsystemState::Stopped);
        assert_eq!(
            supervisor.status("sleeper").await.unwrap().state,
            SubsystemState::Stopped
        );
    }

    /// Zombies count as dead: an orphan may wait on a reaper that never comes
    fn is_dead(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_err(),
        }
    }

    #[tokio::test]
    async fn test_stop_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("grandchild.pid");
        let supervisor = ProcessSupervisor::new(&[SubsystemConfig {
            id: "forker".to_string(),
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                format!("sleep 30 & echo $! > {}; wait", marker.display()),
            ],
            working_dir: None,
        }]);
        supervisor.start("forker").await.unwrap();

        let mut grandchild = None;
        for _ in 0..50 {
            if let Ok(text) = std::fs::read_to_string(&marker) {
                if let Ok(pid) = text.trim().parse::<i32>() {
                    grandchild = Some(pid);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let grandchild = grandchild.unwrap();

        supervisor.stop("forker").await.unwrap();

        let mut gone = false;
        for _ in 0..50 {
            if is_dead(grandchild) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "grandchild survived stop");
    }

    #[tokio::test]
    async fn test_crashed_child_reports_stopped() {
        let supervisor = supervisor();
        supervisor.start("crasher").await.unwrap();

        let mut status = supervisor.status("crasher").await.unwrap();
        for _ in 0..50 {
            if status.state == SubsystemState::Stopped {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = supervisor.status("crasher").await.unwrap();
        }
        assert_eq!(status.state, SubsystemState::Stopped);
        assert_eq!(status.exit_code, Some(3));

        // Restart is allowed once the crash is observed
        supervisor.start("crasher").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_subsystem() {
        let supervisor = supervisor();
        assert!(matches!(
            supervisor.start("nope").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            supervisor.status("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_ordered() {
        let supervisor = supervisor();
        let ids: Vec<String> = supervisor
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["crasher", "sleeper"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_children() {
        let supervisor = supervisor();
        supervisor.start("sleeper").await.unwrap();
        supervisor.shutdown().await;
        assert_eq!(
            supervisor.status("sleeper").await.unwrap().state,
            SubsystemState::Stopped
        );
    }
}
