//! Scripted stand-ins for the health probe and the child process, shared by
//! unit and integration tests.

use crate::error::Result;
use crate::health::{HealthProbe, ProbeOutcome};
use crate::process::{ExitStatus, ProcessHandle};
use crate::signals::SignalEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Probe that replays a script of outcomes
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeOutcome>>,
    ready_when_exhausted: bool,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ProbeOutcome>, ready_when_exhausted: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ready_when_exhausted,
            calls: AtomicU32::new(0),
        }
    }

    /// Fails with connection refused until attempt `attempt`, which succeeds
    pub fn succeed_on(attempt: u32) -> Self {
        let failures = (1..attempt)
            .map(|_| ProbeOutcome::Error("connection refused".to_string()))
            .collect();
        Self::new(failures, true)
    }

    /// Never succeeds
    pub fn never() -> Self {
        Self::new(Vec::new(), false)
    }

    /// Number of probes issued so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HealthProbe for ScriptedProbe {
    async fn check(&self) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match next {
            Some(outcome) => outcome,
            None if self.ready_when_exhausted => ProbeOutcome::Ready,
            None => ProbeOutcome::Error("connection refused".to_string()),
        }
    }
}

/// In-memory child process
#[derive(Debug)]
pub struct FakeChild {
    pid: u32,
    checks_before_exit: Option<u32>,
    liveness_checks: u32,
    exit_on_death: ExitStatus,
    exit: Option<ExitStatus>,
    ignores_terminate: bool,
    signals: Vec<SignalEvent>,
    killed: bool,
}

impl FakeChild {
    /// A child that runs until signalled
    pub fn running() -> Self {
        Self {
            pid: 4242,
            checks_before_exit: None,
            liveness_checks: 0,
            exit_on_death: ExitStatus::from_code(1),
            exit: None,
            ignores_terminate: false,
            signals: Vec::new(),
            killed: false,
        }
    }

    /// A child that reports alive for `checks` liveness checks, then exits
    pub fn exits_after_checks(checks: u32, status: ExitStatus) -> Self {
        Self {
            checks_before_exit: Some(checks),
            exit_on_death: status,
            ..Self::running()
        }
    }

    /// A child that ignores forwarded signals and only dies when killed
    pub fn stubborn() -> Self {
        Self {
            ignores_terminate: true,
            ..Self::running()
        }
    }

    /// Signals forwarded to this child, in order
    pub fn signals(&self) -> &[SignalEvent] {
        &self.signals
    }

    pub fn was_killed(&self) -> bool {
        self.killed
    }

    pub fn liveness_checks(&self) -> u32 {
        self.liveness_checks
    }
}

impl ProcessHandle for FakeChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        self.liveness_checks += 1;
        match self.checks_before_exit {
            Some(limit) if self.liveness_checks > limit => {
                self.exit = Some(self.exit_on_death);
                false
            }
            _ => true,
        }
    }

    fn terminate(&mut self, signal: SignalEvent) -> Result<()> {
        self.signals.push(signal);
        if !self.ignores_terminate && self.exit.is_none() {
            self.exit = Some(ExitStatus::from_code(0));
        }
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        self.killed = true;
        if self.exit.is_none() {
            self.exit = Some(ExitStatus::from_signal(9));
        }
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        match self.exit {
            Some(status) => Ok(status),
            None => std::future::pending().await,
        }
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }
}
