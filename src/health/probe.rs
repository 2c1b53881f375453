//! Health probes.
//!
//! A probe issues one bounded request against the child's health endpoint.
//! The request timeout is independent of the gate's polling budget.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Outcome of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with a 2xx status.
    Ready,
    /// The endpoint answered with a non-2xx status.
    NotReady(u16),
    /// No usable answer: connection refused, handshake failure or timeout.
    Error(String),
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready)
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Ready => write!(f, "ready"),
            ProbeOutcome::NotReady(status) => write!(f, "not ready (HTTP {})", status),
            ProbeOutcome::Error(reason) => write!(f, "error ({})", reason),
        }
    }
}

/// Result of one poll of the health gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub outcome: ProbeOutcome,
    /// 1-based attempt number this result belongs to.
    pub attempt: u32,
}

/// Something that can tell whether the child is ready to serve.
pub trait HealthProbe {
    fn check(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

/// HTTP/1 GET probe against a loopback health endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    address: String,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(address: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            path: path.into(),
            timeout,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.address, self.path)
    }

    async fn request(&self) -> ProbeOutcome {
        let uri = self.url();

        let stream = match tokio::net::TcpStream::connect(&self.address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "health probe connection failed");
                return ProbeOutcome::Error(e.to_string());
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "health probe handshake failed");
                return ProbeOutcome::Error(e.to_string());
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&self.path)
            .header("host", &self.address)
            .header("user-agent", concat!("healthgate/", env!("CARGO_PKG_VERSION")))
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => return ProbeOutcome::Error(format!("invalid request: {}", e)),
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status().is_success() => ProbeOutcome::Ready,
            Ok(resp) => {
                debug!(status = %resp.status(), %uri, "health probe non-2xx");
                ProbeOutcome::NotReady(resp.status().as_u16())
            }
            Err(e) => {
                debug!(error = %e, %uri, "health probe request failed");
                ProbeOutcome::Error(e.to_string())
            }
        }
    }
}

impl HealthProbe for HttpProbe {
    async fn check(&self) -> ProbeOutcome {
        match tokio::time::timeout(self.timeout, self.request()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(uri = %self.url(), "health probe timed out");
                ProbeOutcome::Error(format!("timed out after {:?}", self.timeout))
            }
        }
    }
}
