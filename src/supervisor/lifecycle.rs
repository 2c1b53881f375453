use crate::error::Result;
use crate::process::{ExitStatus, LifecycleState, ProcessHandle, ResourceSampler, SupervisedProcess};
use crate::signals::SignalEvent;
use crate::supervisor::shutdown::{stop_child, ShutdownLatch};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// How the steady-state loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// A termination signal was forwarded and the child exited
    Shutdown {
        signal: SignalEvent,
        status: ExitStatus,
    },
    /// The child disappeared on its own
    Crashed(Option<ExitStatus>),
}

/// Watches a ready child until it crashes or a termination signal arrives
///
/// There is no restart: a crash ends the run and whoever started the
/// supervisor decides what happens next.
pub struct LifecycleMonitor {
    liveness_interval: Duration,
    shutdown_grace: Option<Duration>,
    sampler: ResourceSampler,
}

impl LifecycleMonitor {
    pub fn new(liveness_interval: Duration, shutdown_grace: Option<Duration>) -> Self {
        Self {
            liveness_interval,
            shutdown_grace,
            sampler: ResourceSampler::new(),
        }
    }

    /// Run the steady-state loop
    ///
    /// Each iteration waits for either the next liveness tick or a signal
    /// event. The first signal to pass the latch starts the shutdown; later
    /// ones are ignored.
    pub async fn run<H: ProcessHandle>(
        &mut self,
        process: &mut SupervisedProcess<H>,
        signals: &mut mpsc::Receiver<SignalEvent>,
        latch: &ShutdownLatch,
    ) -> Result<MonitorExit> {
        info!(
            "Monitoring {} (PID: {}) every {:?}",
            process.name, process.pid, self.liveness_interval
        );

        let mut ticker = tokio::time::interval(self.liveness_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !process.handle.is_alive() {
                        let status = process.handle.exit_status();
                        process.transition(LifecycleState::Crashed)?;
                        error!(
                            "{} (PID: {}) is no longer running ({}) after {:?}",
                            process.name,
                            process.pid,
                            status
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| "unknown exit status".to_string()),
                            process.uptime()
                        );
                        return Ok(MonitorExit::Crashed(status));
                    }

                    if let Some(usage) = self.sampler.sample(process.pid) {
                        debug!(
                            "{} (PID: {}) alive: cpu {:.1}%, memory {} bytes",
                            process.name, process.pid, usage.cpu_usage, usage.memory
                        );
                    }
                }
                Some(signal) = signals.recv() => {
                    if !latch.trigger() {
                        info!("Shutdown already in progress; ignoring {}", signal);
                        continue;
                    }

                    let status = stop_child(process, signal, self.shutdown_grace, signals).await?;
                    return Ok(MonitorExit::Shutdown { signal, status });
                }
            }
        }
    }
}
