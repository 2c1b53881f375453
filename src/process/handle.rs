use crate::error::{HealthgateError, Result};
use crate::process::ExitStatus;
use crate::signals::SignalEvent;
use std::future::Future;
use tokio::process::Child;

/// Capabilities the supervisor needs from a running child
///
/// The health gate and lifecycle monitor only talk to the child through
/// this trait, so no OS signal numbers or status types leak into them.
pub trait ProcessHandle {
    /// OS process ID
    fn pid(&self) -> u32;

    /// Whether the child is still running
    fn is_alive(&mut self) -> bool;

    /// Ask the child to shut down by forwarding `signal`
    fn terminate(&mut self, signal: SignalEvent) -> Result<()>;

    /// Force the child to exit
    fn kill(&mut self) -> Result<()>;

    /// Wait for the child to exit. Cancel safe.
    fn wait(&mut self) -> impl Future<Output = Result<ExitStatus>> + Send;

    /// Exit status, if the child is known to have exited
    fn exit_status(&self) -> Option<ExitStatus>;
}

/// A launched OS child process
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    pid: u32,
    exit: Option<ExitStatus>,
    group_leader: bool,
}

impl ChildProcess {
    pub fn new(child: Child, pid: u32) -> Self {
        Self {
            child,
            pid,
            exit: None,
            group_leader: false,
        }
    }

    /// A child that leads its own process group; signals and kills are
    /// delivered to the whole group
    pub fn group_leader(child: Child, pid: u32) -> Self {
        Self {
            group_leader: true,
            ..Self::new(child, pid)
        }
    }

    /// Mutable access to the underlying child, e.g. to take its pipes
    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    #[cfg(unix)]
    fn send_signal(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::sys::signal::{kill, killpg};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.pid as i32);
        let sent = if self.group_leader {
            killpg(pid, signal)
        } else {
            kill(pid, signal)
        };

        sent.map_err(|e| {
            HealthgateError::StopError(
                self.pid.to_string(),
                format!("Failed to send {}: {}", signal, e),
            )
        })
    }

    /// Fallback liveness check by PID when the child handle cannot be polled
    #[cfg(unix)]
    fn pid_exists(&self) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.pid as i32), None).is_ok()
    }

    #[cfg(not(unix))]
    fn pid_exists(&self) -> bool {
        false
    }
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit = Some(status.into());
                false
            }
            Err(e) => {
                tracing::warn!("Failed to poll child {}: {}; probing PID", self.pid, e);
                self.pid_exists()
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&mut self, signal: SignalEvent) -> Result<()> {
        use nix::sys::signal::Signal;

        if self.exit.is_some() {
            return Ok(());
        }
        let os_signal = match signal {
            SignalEvent::Interrupt => Signal::SIGINT,
            SignalEvent::Terminate => Signal::SIGTERM,
        };
        self.send_signal(os_signal)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self, _signal: SignalEvent) -> Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            if self.group_leader {
                return self.send_signal(nix::sys::signal::Signal::SIGKILL);
            }
        }

        self.child.start_kill().map_err(|e| {
            HealthgateError::StopError(self.pid.to_string(), format!("Failed to kill: {}", e))
        })
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status: ExitStatus = self.child.wait().await?.into();
        self.exit = Some(status);
        Ok(status)
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }
}
