// Termination signal reception

use crate::error::{HealthgateError, Result};
use tokio::sync::mpsc;
use tracing::info;

/// A termination request delivered to the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalEvent::Interrupt => write!(f, "SIGINT"),
            SignalEvent::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Install SIGINT/SIGTERM handlers and forward every delivery as an event
///
/// Handlers are registered before this returns, so a signal arriving right
/// after startup is never lost. Repeated signals are all forwarded; the
/// receiver decides which one triggers shutdown.
#[cfg(unix)]
pub fn listen() -> Result<mpsc::Receiver<SignalEvent>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
        HealthgateError::SignalError(format!("Failed to setup SIGTERM handler: {}", e))
    })?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
        HealthgateError::SignalError(format!("Failed to setup SIGINT handler: {}", e))
    })?;

    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                Some(()) = sigterm.recv() => SignalEvent::Terminate,
                Some(()) = sigint.recv() => SignalEvent::Interrupt,
                else => break,
            };

            info!("Received {}", event);
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn listen() -> Result<mpsc::Receiver<SignalEvent>> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", HealthgateError::SignalError(e.to_string()));
                break;
            }
            info!("Received {}", SignalEvent::Interrupt);
            if tx.send(SignalEvent::Interrupt).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_event_display() {
        assert_eq!(SignalEvent::Interrupt.to_string(), "SIGINT");
        assert_eq!(SignalEvent::Terminate.to_string(), "SIGTERM");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_listen_forwards_sigterm() {
        use nix::sys::signal::{raise, Signal};

        let mut rx = listen().unwrap();
        raise(Signal::SIGTERM).unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(SignalEvent::Terminate));
    }
}
