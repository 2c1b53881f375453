use crate::error::Result;
use crate::process::{ExitStatus, LifecycleState, ProcessHandle, SupervisedProcess};
use crate::signals::SignalEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// One-shot guard for the shutdown transition
#[derive(Debug, Default)]
pub struct ShutdownLatch {
    triggered: AtomicBool,
}

impl ShutdownLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once, for the first caller
    pub fn trigger(&self) -> bool {
        !self.triggered.swap(true, Ordering::SeqCst)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

enum Drain {
    Exited(Result<ExitStatus>),
    Repeated(SignalEvent),
    GraceExpired,
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Forward `signal` to the child and wait for it to exit
///
/// With a grace period the child is killed once it expires; without one the
/// wait is unbounded. Signals arriving in the meantime are logged and
/// otherwise ignored.
pub async fn stop_child<H: ProcessHandle>(
    process: &mut SupervisedProcess<H>,
    signal: SignalEvent,
    grace: Option<Duration>,
    signals: &mut mpsc::Receiver<SignalEvent>,
) -> Result<ExitStatus> {
    process.transition(LifecycleState::ShuttingDown)?;

    info!(
        "Forwarding {} to {} (PID: {})",
        signal, process.name, process.pid
    );
    process.handle.terminate(signal)?;

    let mut deadline = grace.map(|grace| Instant::now() + grace);

    let status = loop {
        let step = tokio::select! {
            status = process.handle.wait() => Drain::Exited(status),
            Some(extra) = signals.recv() => Drain::Repeated(extra),
            _ = deadline_reached(deadline) => Drain::GraceExpired,
        };

        match step {
            Drain::Exited(status) => break status?,
            Drain::Repeated(extra) => {
                info!("Shutdown already in progress; ignoring {}", extra);
            }
            Drain::GraceExpired => {
                warn!(
                    "{} (PID: {}) did not exit within {:?}, killing it",
                    process.name,
                    process.pid,
                    grace.unwrap_or_default()
                );
                process.handle.kill()?;
                deadline = None;
            }
        }
    };

    process.transition(LifecycleState::Stopped)?;
    info!("{} (PID: {}) exited with {}", process.name, process.pid, status);

    Ok(status)
}
