// Steady-state monitoring of a real child after the health gate

use healthgate::config::SupervisorConfig;
use healthgate::process::{launch, ExitStatus, LaunchSpec, LifecycleState, SupervisedProcess};
use healthgate::signals::SignalEvent;
use healthgate::supervisor::{LifecycleMonitor, MonitorExit, ShutdownLatch};
use std::time::Duration;
use tokio::sync::mpsc;

fn ready_child(script: &str) -> SupervisedProcess<healthgate::process::ChildProcess> {
    let mut config = SupervisorConfig::new("svc", "/bin/sh");
    config.args = vec!["-c".to_string(), script.to_string()];

    let spec = LaunchSpec::from_config(&config).unwrap();
    let handle = launch(&spec).unwrap();
    let mut process = SupervisedProcess::new("svc", handle, config.port);
    process.transition(LifecycleState::Ready).unwrap();
    process
}

#[tokio::test]
async fn test_crash_after_ready_is_detected() {
    let mut process = ready_child("sleep 0.3; exit 7");
    let (_tx, mut rx) = mpsc::channel(4);
    let latch = ShutdownLatch::new();
    let mut monitor = LifecycleMonitor::new(Duration::from_millis(50), Some(Duration::from_secs(5)));

    let exit = tokio::time::timeout(
        Duration::from_secs(10),
        monitor.run(&mut process, &mut rx, &latch),
    )
    .await
    .expect("monitor should notice the exit")
    .unwrap();

    assert_eq!(exit, MonitorExit::Crashed(Some(ExitStatus::from_code(7))));
    assert_eq!(process.state(), LifecycleState::Crashed);
    assert!(!latch.is_triggered());
}

#[tokio::test]
async fn test_repeated_signals_forward_once() {
    let mut process = ready_child("exec sleep 30");
    let (tx, mut rx) = mpsc::channel(4);
    let latch = ShutdownLatch::new();
    let mut monitor = LifecycleMonitor::new(Duration::from_millis(50), Some(Duration::from_secs(5)));

    tx.send(SignalEvent::Terminate).await.unwrap();
    tx.send(SignalEvent::Interrupt).await.unwrap();

    let exit = monitor.run(&mut process, &mut rx, &latch).await.unwrap();

    assert_eq!(
        exit,
        MonitorExit::Shutdown {
            signal: SignalEvent::Terminate,
            status: ExitStatus::from_signal(15),
        }
    );
    assert_eq!(process.state(), LifecycleState::Stopped);
    assert!(latch.is_triggered());
}

#[tokio::test]
async fn test_child_ignoring_sigterm_is_killed_after_grace() {
    let mut process = ready_child("trap '' TERM; while :; do sleep 1; done");
    let (tx, mut rx) = mpsc::channel(4);
    let latch = ShutdownLatch::new();
    let mut monitor =
        LifecycleMonitor::new(Duration::from_millis(50), Some(Duration::from_millis(300)));

    // Give the shell time to install its trap
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(SignalEvent::Terminate).await.unwrap();

    let exit = monitor.run(&mut process, &mut rx, &latch).await.unwrap();

    assert_eq!(
        exit,
        MonitorExit::Shutdown {
            signal: SignalEvent::Terminate,
            status: ExitStatus::from_signal(9),
        }
    );
}
