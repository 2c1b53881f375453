// Supervisor - preflight, launch, health gate and steady-state monitoring

mod context;
pub mod lifecycle;
pub mod shutdown;

pub use context::SupervisorContext;
pub use lifecycle::{LifecycleMonitor, MonitorExit};
pub use shutdown::{stop_child, ShutdownLatch};

use crate::config::SupervisorConfig;
use crate::error::{HealthgateError, Result};
use crate::health::{wait_until_healthy, GateReport, GateVerdict, HttpProbe};
use crate::logs::capture_output;
use crate::preflight;
use crate::process::{
    launch, ChildProcess, ExitStatus, LaunchSpec, LifecycleState, ResourceSampler,
    SupervisedProcess,
};
use crate::signals::SignalEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long to wait for the last child output to reach the log file
const CAPTURE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Clean end of a supervisor run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorExit {
    /// The signal that triggered the shutdown
    pub signal: SignalEvent,
    /// How the child exited
    pub child_status: ExitStatus,
}

/// Snapshot handed to the ready hook once the health gate passes
#[derive(Debug, Clone)]
pub struct ReadySummary {
    pub name: String,
    pub pid: u32,
    pub port: u16,
    pub health_url: String,
    pub attempts: u32,
    pub startup_time: Duration,
    pub memory: Option<u64>,
    pub log_path: std::path::PathBuf,
}

type ReadyHook = Box<dyn Fn(&ReadySummary) + Send + Sync>;

enum Startup {
    Gated(GateReport),
    Interrupted(SignalEvent),
}

/// Runs one supervised child from preflight to exit
///
/// Exactly one launch is attempted per run. Every fatal condition is
/// returned as an error after it has been recorded in the log file;
/// a signal-triggered shutdown is the only successful outcome.
pub struct Supervisor {
    config: SupervisorConfig,
    on_ready: Option<ReadyHook>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            on_ready: None,
        }
    }

    /// Call `hook` once the child has passed the health gate
    pub fn on_ready<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReadySummary) + Send + Sync + 'static,
    {
        self.on_ready = Some(Box::new(hook));
        self
    }

    /// Supervise until shutdown or failure
    ///
    /// `signals` delivers termination requests; use
    /// [`crate::signals::listen`] for real OS signals.
    pub async fn run(self, mut signals: mpsc::Receiver<SignalEvent>) -> Result<SupervisorExit> {
        let ctx = SupervisorContext::open(self.config).await?;

        let result = drive(&ctx, self.on_ready.as_ref(), &mut signals).await;

        match result {
            Ok(ref exit) => {
                ctx.record(&format!(
                    "shutdown after {}; child exited with {}",
                    exit.signal, exit.child_status
                ))
                .await;
            }
            Err(ref e) => {
                error!("{}", e);
                ctx.record(&format!("fatal: {}", e)).await;
                if e.wants_log_tail() {
                    dump_log_tail(&ctx).await;
                }
            }
        }

        ctx.close().await;
        result
    }
}

async fn drive(
    ctx: &SupervisorContext,
    on_ready: Option<&ReadyHook>,
    signals: &mut mpsc::Receiver<SignalEvent>,
) -> Result<SupervisorExit> {
    let config = ctx.config();

    preflight::check_port(config.port).await?;

    let spec = LaunchSpec::from_config(config)?;
    let mut handle = launch(&spec)?;
    let capture = capture_output(handle.child_mut(), ctx.log())?;
    let mut process = SupervisedProcess::new(config.name.clone(), handle, config.port);

    ctx.record(&format!(
        "launched {} (PID: {}) on port {}",
        spec.program.display(),
        process.pid,
        config.port
    ))
    .await;
    info!(
        "Waiting for {} (up to {} attempts)",
        config.health_url(),
        config.retry.max_attempts
    );

    let probe = HttpProbe::new(
        config.probe_address(),
        config.health_path.clone(),
        config.request_timeout,
    );

    let startup = tokio::select! {
        report = wait_until_healthy(&probe, &mut process.handle, &config.retry) => Startup::Gated(report),
        Some(signal) = signals.recv() => Startup::Interrupted(signal),
    };

    let report = match startup {
        Startup::Gated(report) => report,
        Startup::Interrupted(signal) => {
            ctx.latch().trigger();
            ctx.record(&format!("{} received during startup", signal)).await;
            let child_status =
                stop_child(&mut process, signal, config.shutdown_grace(), signals).await?;
            drain_capture(capture).await;
            return Ok(SupervisorExit {
                signal,
                child_status,
            });
        }
    };

    match report.verdict {
        GateVerdict::Ready => {
            process.transition(LifecycleState::Ready)?;
            ctx.record(&format!(
                "ready after {} attempt(s), {:?} waited",
                report.attempts, report.slept
            ))
            .await;
        }
        GateVerdict::TimedOut => {
            ctx.latch().trigger();
            ctx.record(&format!(
                "not healthy after {} attempt(s); stopping child",
                report.attempts
            ))
            .await;
            if let Err(e) = stop_child(
                &mut process,
                SignalEvent::Terminate,
                config.shutdown_grace(),
                signals,
            )
            .await
            {
                warn!("Failed to stop unhealthy child: {}", e);
            }
            drain_capture(capture).await;
            return Err(HealthgateError::HealthTimeout {
                attempts: report.attempts,
                waited: report.slept,
            });
        }
        GateVerdict::ChildDied(status) => {
            process.transition(LifecycleState::Crashed)?;
            drain_capture(capture).await;
            return Err(HealthgateError::ChildCrashDuringStartup {
                attempts: report.attempts,
                status: describe(status),
            });
        }
    }

    if let Some(hook) = on_ready {
        hook(&ready_summary(ctx, &process, &report));
    }

    let mut monitor = LifecycleMonitor::new(config.liveness_interval, config.shutdown_grace());
    let exit = monitor.run(&mut process, signals, ctx.latch()).await?;
    drain_capture(capture).await;

    match exit {
        MonitorExit::Shutdown { signal, status } => Ok(SupervisorExit {
            signal,
            child_status: status,
        }),
        MonitorExit::Crashed(status) => Err(HealthgateError::ChildCrashAfterReady(describe(status))),
    }
}

fn ready_summary(
    ctx: &SupervisorContext,
    process: &SupervisedProcess<ChildProcess>,
    report: &GateReport,
) -> ReadySummary {
    let memory = ResourceSampler::new()
        .sample(process.pid)
        .map(|usage| usage.memory);

    ReadySummary {
        name: process.name.clone(),
        pid: process.pid,
        port: process.port,
        health_url: ctx.config().health_url(),
        attempts: report.attempts,
        startup_time: process.uptime(),
        memory,
        log_path: ctx.log_path().to_path_buf(),
    }
}

fn describe(status: Option<ExitStatus>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown exit status".to_string())
}

/// Wait briefly for the capture tasks so the child's last words are logged
async fn drain_capture(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if tokio::time::timeout(CAPTURE_DRAIN_TIMEOUT, task).await.is_err() {
            warn!("Child output pipe still open after exit; not waiting for it");
        }
    }
}

async fn dump_log_tail(ctx: &SupervisorContext) {
    match ctx.log_tail().await {
        Ok(lines) if lines.is_empty() => {
            warn!("{} is empty", ctx.log_path().display());
        }
        Ok(lines) => {
            warn!(
                "Last {} line(s) of {}:",
                lines.len(),
                ctx.log_path().display()
            );
            for line in lines {
                warn!("  {}", line);
            }
        }
        Err(e) => warn!("Failed to read {}: {}", ctx.log_path().display(), e),
    }
}
