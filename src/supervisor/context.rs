use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::logs::{read_last_lines, LogWriter, SharedLog};
use crate::supervisor::shutdown::ShutdownLatch;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// State shared by every phase of one supervisor run
///
/// Built once at startup and closed on every exit path, which flushes the
/// log file.
pub struct SupervisorContext {
    config: SupervisorConfig,
    log: SharedLog,
    log_path: PathBuf,
    latch: ShutdownLatch,
}

impl SupervisorContext {
    pub async fn open(config: SupervisorConfig) -> Result<Self> {
        let writer = LogWriter::open(&config.log_dir, &config.name).await?;
        let log_path = writer.path().to_path_buf();

        Ok(Self {
            config,
            log: Arc::new(Mutex::new(writer)),
            log_path,
            latch: ShutdownLatch::new(),
        })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn log(&self) -> SharedLog {
        Arc::clone(&self.log)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn latch(&self) -> &ShutdownLatch {
        &self.latch
    }

    /// Append a supervisor event to the log file
    ///
    /// Failing to log never aborts supervision.
    pub async fn record(&self, message: &str) {
        if let Err(e) = self.log.lock().await.record(message).await {
            warn!("Failed to record '{}': {}", message, e);
        }
    }

    /// Last `log_tail_lines` lines of the log file, flushed first
    pub async fn log_tail(&self) -> Result<Vec<String>> {
        self.log.lock().await.flush().await?;
        read_last_lines(&self.log_path, self.config.log_tail_lines).await
    }

    /// Flush the log file
    pub async fn close(self) {
        if let Err(e) = self.log.lock().await.flush().await {
            warn!("Failed to flush {}: {}", self.log_path.display(), e);
        }
    }
}
