use crate::error::{HealthgateError, Result};
use crate::logs::{LogSource, LogWriter};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Log writer shared between the supervisor and the capture tasks
pub type SharedLog = Arc<Mutex<LogWriter>>;

/// Capture stdout and stderr of `child` into the log file
///
/// Spawns one task per pipe; each task ends when its pipe reaches EOF, i.e.
/// when the child exits. The returned handles can be awaited to make sure
/// every line has been written.
pub fn capture_output(child: &mut Child, log: SharedLog) -> Result<Vec<JoinHandle<()>>> {
    let stdout = child.stdout.take().ok_or_else(|| {
        HealthgateError::LogError("No stdout pipe available for child".to_string())
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        HealthgateError::LogError("No stderr pipe available for child".to_string())
    })?;

    Ok(vec![
        tokio::spawn(pipe_to_log(stdout, LogSource::Stdout, log.clone())),
        tokio::spawn(pipe_to_log(stderr, LogSource::Stderr, log)),
    ])
}

async fn pipe_to_log<R>(pipe: R, source: LogSource, log: SharedLog)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if let Err(e) = log.lock().await.write_line(source, &line).await {
                    tracing::warn!("Dropping child {} output: {}", source, e);
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading child {}: {}", source, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tempfile::TempDir;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_capture_both_streams() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LogWriter::open(temp_dir.path(), "capture").await.unwrap();
        let path = writer.path().to_path_buf();
        let log: SharedLog = Arc::new(Mutex::new(writer));

        let mut child = Command::new("/bin/sh")
            .args(["-c", "echo to-stdout; echo to-stderr >&2"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let tasks = capture_output(&mut child, log.clone()).unwrap();
        child.wait().await.unwrap();
        for task in tasks {
            task.await.unwrap();
        }
        log.lock().await.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("[out] to-stdout"));
        assert!(content.contains("[err] to-stderr"));
    }

    #[tokio::test]
    async fn test_capture_requires_pipes() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LogWriter::open(temp_dir.path(), "capture").await.unwrap();
        let log: SharedLog = Arc::new(Mutex::new(writer));

        let mut child = Command::new("/bin/sh").args(["-c", "true"]).spawn().unwrap();
        let result = capture_output(&mut child, log);
        assert!(matches!(result, Err(HealthgateError::LogError(_))));
        child.wait().await.unwrap();
    }
}
