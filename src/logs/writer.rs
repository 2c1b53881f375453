use crate::error::{HealthgateError, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;

/// Where a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Child stdout
    Stdout,
    /// Child stderr
    Stderr,
    /// The supervisor itself
    Supervisor,
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSource::Stdout => write!(f, "out"),
            LogSource::Stderr => write!(f, "err"),
            LogSource::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Path of the log file for `name` on `date`
pub fn log_file_path(log_dir: &Path, name: &str, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}-{}.log", name, date.format("%Y-%m-%d")))
}

/// Append-only writer for the dated supervisor log file
///
/// Child stdout, child stderr and supervisor lifecycle events all land in
/// the same file, one timestamped line each.
pub struct LogWriter {
    path: PathBuf,
    file: TokioFile,
    size: u64,
}

impl LogWriter {
    /// Open (or create) today's log file for `name` in `log_dir`
    pub async fn open(log_dir: &Path, name: &str) -> Result<Self> {
        let path = log_file_path(log_dir, name, Local::now().date_naive());
        Self::open_path(path).await
    }

    /// Open (or create) a specific log file
    pub async fn open_path(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                HealthgateError::LogError(format!("Failed to create log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                HealthgateError::LogFileError(format!("{}: {}", path.display(), e))
            })?;

        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            file: TokioFile::from_std(file),
            size,
        })
    }

    /// Append one line with a timestamp and source tag
    pub async fn write_line(&mut self, source: LogSource, data: &[u8]) -> Result<()> {
        let entry = format_log_entry(&Local::now(), source, data);

        self.file
            .write_all(&entry)
            .await
            .map_err(|e| HealthgateError::LogError(format!("Failed to write to log: {}", e)))?;

        self.size += entry.len() as u64;
        Ok(())
    }

    /// Record a supervisor event
    pub async fn record(&mut self, message: &str) -> Result<()> {
        self.write_line(LogSource::Supervisor, message.as_bytes())
            .await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the file, including what was there before it was opened
    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| HealthgateError::LogError(format!("Failed to flush log: {}", e)))
    }
}

/// Format: `[YYYY-MM-DD HH:MM:SS.mmm] [source] <data>\n`
fn format_log_entry(timestamp: &DateTime<Local>, source: LogSource, data: &[u8]) -> Vec<u8> {
    let prefix = format!("[{}] [{}] ", timestamp.format("%Y-%m-%d %H:%M:%S%.3f"), source);
    let mut entry = Vec::with_capacity(prefix.len() + data.len() + 1);

    entry.extend_from_slice(prefix.as_bytes());
    entry.extend_from_slice(data.strip_suffix(b"\n").unwrap_or(data));
    entry.push(b'\n');

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_dated_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested");

        let writer = LogWriter::open(&log_dir, "api").await.unwrap();

        let expected = log_file_path(&log_dir, "api", Local::now().date_naive());
        assert_eq!(writer.path(), expected.as_path());
        assert!(expected.exists());
        let file_name = expected.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.starts_with("api-20"));
        assert!(file_name.ends_with(".log"));
    }

    #[tokio::test]
    async fn test_lines_are_timestamped_and_tagged() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogWriter::open(temp_dir.path(), "api").await.unwrap();

        writer.write_line(LogSource::Stdout, b"Uvicorn running\n").await.unwrap();
        writer.write_line(LogSource::Stderr, b"warning").await.unwrap();
        writer.record("health check passed").await.unwrap();
        writer.flush().await.unwrap();

        let content = tokio::fs::read_to_string(writer.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("[out] Uvicorn running"));
        assert!(lines[1].ends_with("[err] warning"));
        assert!(lines[2].ends_with("[supervisor] health check passed"));
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let temp_dir = TempDir::new().unwrap();

        let mut first = LogWriter::open(temp_dir.path(), "api").await.unwrap();
        first.record("first run").await.unwrap();
        first.flush().await.unwrap();
        let size_after_first = first.size();
        drop(first);

        let mut second = LogWriter::open(temp_dir.path(), "api").await.unwrap();
        assert_eq!(second.size(), size_after_first);
        second.record("second run").await.unwrap();
        second.flush().await.unwrap();

        let content = tokio::fs::read_to_string(second.path()).await.unwrap();
        assert!(content.contains("first run"));
        assert!(content.contains("second run"));
    }
}
