// Preflight checks run before the child is launched

use crate::error::{HealthgateError, Result};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// How long the connect probe may take before availability is assumed
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Check whether nothing is listening on `port` on the loopback interface
///
/// A refused connection means the port is free; an accepted one means it is
/// taken. When the probe cannot tell (timeout or any other error) the port
/// is assumed to be available and a warning is logged.
pub async fn is_port_available(port: u16) -> bool {
    let address = ("127.0.0.1", port);

    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => false,
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => true,
        Ok(Err(e)) => {
            warn!(
                "Could not determine whether port {} is free ({}); assuming it is",
                port, e
            );
            true
        }
        Err(_) => {
            warn!(
                "Port probe for {} timed out after {:?}; assuming it is free",
                port, PROBE_TIMEOUT
            );
            true
        }
    }
}

/// Fail with [`HealthgateError::PortConflict`] when `port` is already taken
pub async fn check_port(port: u16) -> Result<()> {
    if is_port_available(port).await {
        info!("Port {} is available", port);
        Ok(())
    } else {
        Err(HealthgateError::PortConflict(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_port_with_listener_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(!is_port_available(port).await);
        assert!(matches!(
            check_port(port).await,
            Err(HealthgateError::PortConflict(p)) if p == port
        ));
    }

    #[tokio::test]
    async fn test_free_port_is_available() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(is_port_available(port).await);
        assert!(check_port(port).await.is_ok());
    }
}
