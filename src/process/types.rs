use crate::error::{HealthgateError, Result};
use crate::process::ProcessHandle;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Lifecycle state of the supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Starting,
    Ready,
    ShuttingDown,
    Crashed,
    Stopped,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Starting, Ready)
                | (Starting, Crashed)
                | (Starting, ShuttingDown)
                | (Ready, Crashed)
                | (Ready, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Crashed | LifecycleState::Stopped)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::ShuttingDown => write!(f, "shutting down"),
            LifecycleState::Crashed => write!(f, "crashed"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Portable description of how a child exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code, when the child exited on its own
    pub code: Option<i32>,
    /// Terminating signal number, when the child was killed by a signal
    pub signal: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// The one child process a supervisor run owns
#[derive(Debug)]
pub struct SupervisedProcess<H> {
    pub name: String,
    pub handle: H,
    pub pid: u32,
    pub port: u16,
    pub started_at: SystemTime,
    state: LifecycleState,
}

impl<H: ProcessHandle> SupervisedProcess<H> {
    pub fn new(name: impl Into<String>, handle: H, port: u16) -> Self {
        let pid = handle.pid();
        Self {
            name: name.into(),
            handle,
            pid,
            port,
            started_at: SystemTime::now(),
            state: LifecycleState::Starting,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HealthgateError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("{} (PID: {}): {} -> {}", self.name, self.pid, self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn uptime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or(Duration::from_secs(0))
    }
}
