use crate::error::{HealthgateError, Result};
use std::collections::VecDeque;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Read the last `lines` lines of a log file
///
/// A missing file yields no lines rather than an error, since the failure
/// being diagnosed may have happened before anything was logged.
pub async fn read_last_lines(file_path: &Path, lines: usize) -> Result<Vec<String>> {
    if lines == 0 || !file_path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(file_path)
        .await
        .map_err(|e| HealthgateError::LogFileError(format!("Failed to open log file: {}", e)))?;

    let mut tail = VecDeque::with_capacity(lines);
    let mut reader = BufReader::new(file).lines();

    while let Some(line) = reader
        .next_line()
        .await
        .map_err(|e| HealthgateError::LogError(format!("Failed to read log line: {}", e)))?
    {
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Ok(tail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_last_lines_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let lines = read_last_lines(&temp_dir.path().join("missing.log"), 10)
            .await
            .unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_read_last_lines_with_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let content: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        tokio::fs::write(&path, content).await.unwrap();

        let lines = read_last_lines(&path, 3).await.unwrap();
        assert_eq!(lines, vec!["line 8", "line 9", "line 10"]);
    }

    #[tokio::test]
    async fn test_read_last_lines_short_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        tokio::fs::write(&path, "only\n").await.unwrap();

        let lines = read_last_lines(&path, 50).await.unwrap();
        assert_eq!(lines, vec!["only"]);
    }
}
