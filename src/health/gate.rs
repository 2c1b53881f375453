//! Health gate: bounded polling until the child is ready.

use std::time::Duration;

use tracing::{info, warn};

use crate::health::{HealthCheckResult, HealthProbe, RetryPolicy};
use crate::process::{ExitStatus, ProcessHandle};

/// How the gate ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// A probe succeeded.
    Ready,
    /// Every attempt failed.
    TimedOut,
    /// The child exited before becoming ready.
    ChildDied(Option<ExitStatus>),
}

/// Aggregate result of one gate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    pub verdict: GateVerdict,
    /// Number of probes issued.
    pub attempts: u32,
    /// Total time spent sleeping between probes.
    pub slept: Duration,
    /// Result of the final probe, if any was issued.
    pub last_check: Option<HealthCheckResult>,
}

/// Poll `probe` until it reports ready, the budget runs out, or the child dies.
///
/// Each failed probe is followed by a liveness check and then exactly one
/// sleep from the capped delay series; a successful probe returns at once.
pub async fn wait_until_healthy<P, H>(probe: &P, child: &mut H, policy: &RetryPolicy) -> GateReport
where
    P: HealthProbe,
    H: ProcessHandle,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay.min(policy.max_delay);
    let mut slept = Duration::ZERO;
    let mut last_check = None;

    while attempt < policy.max_attempts {
        attempt += 1;
        let outcome = probe.check().await;
        let check = HealthCheckResult { outcome, attempt };

        if check.outcome.is_ready() {
            info!("Health check passed on attempt {}/{}", attempt, policy.max_attempts);
            return GateReport {
                verdict: GateVerdict::Ready,
                attempts: attempt,
                slept,
                last_check: Some(check),
            };
        }

        info!(
            "Waiting for service to become healthy (attempt {}/{}): {}",
            attempt, policy.max_attempts, check.outcome
        );
        last_check = Some(check);

        if !child.is_alive() {
            let status = child.exit_status();
            warn!(
                "Process {} exited before becoming healthy ({})",
                child.pid(),
                status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown exit status".to_string())
            );
            return GateReport {
                verdict: GateVerdict::ChildDied(status),
                attempts: attempt,
                slept,
                last_check,
            };
        }

        tokio::time::sleep(delay).await;
        slept += delay;
        delay = policy.next_delay(delay);
    }

    warn!(
        "Service did not become healthy after {} attempts ({:?} waited)",
        attempt, slept
    );
    GateReport {
        verdict: GateVerdict::TimedOut,
        attempts: attempt,
        slept,
        last_check,
    }
}
