use std::time::Duration;
use thiserror::Error;

/// Main error type for the healthgate supervisor
#[derive(Debug, Error)]
pub enum HealthgateError {
    // Startup failures
    #[error("Port {0} is already in use; refusing to start a second instance")]
    PortConflict(u16),

    #[error("Failed to launch process: {0}")]
    LaunchFailure(String),

    #[error("Process did not become healthy after {attempts} attempts ({waited:?} spent waiting)")]
    HealthTimeout { attempts: u32, waited: Duration },

    #[error("Process exited during startup after {attempts} health check(s): {status}")]
    ChildCrashDuringStartup { attempts: u32, status: String },

    #[error("Process exited unexpectedly after becoming ready: {0}")]
    ChildCrashAfterReady(String),

    // Lifecycle errors
    #[error("Failed to stop process {0}: {1}")]
    StopError(String, String),

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Signal error: {0}")]
    SignalError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Log-related errors
    #[error("Log error: {0}")]
    LogError(String),

    #[error("Failed to open log file: {0}")]
    LogFileError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HealthgateError {
    /// Process exit code reported for this error
    ///
    /// Zero is reserved for a clean shutdown, so every error maps to a
    /// non-zero code. Startup and crash conditions get their own codes to
    /// make them distinguishable from scripts.
    pub fn exit_code(&self) -> i32 {
        match self {
            HealthgateError::PortConflict(_) => 2,
            HealthgateError::LaunchFailure(_) => 3,
            HealthgateError::HealthTimeout { .. } => 4,
            HealthgateError::ChildCrashDuringStartup { .. } => 5,
            HealthgateError::ChildCrashAfterReady(_) => 6,
            _ => 1,
        }
    }

    /// Whether the tail of the log file helps diagnose this failure
    pub fn wants_log_tail(&self) -> bool {
        matches!(
            self,
            HealthgateError::HealthTimeout { .. }
                | HealthgateError::ChildCrashDuringStartup { .. }
                | HealthgateError::ChildCrashAfterReady(_)
        )
    }
}

/// Result type alias for healthgate operations
pub type Result<T> = std::result::Result<T, HealthgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_non_zero_and_distinct() {
        let errors = [
            HealthgateError::PortConflict(8000),
            HealthgateError::LaunchFailure("missing".to_string()),
            HealthgateError::HealthTimeout {
                attempts: 15,
                waited: Duration::from_secs(104),
            },
            HealthgateError::ChildCrashDuringStartup {
                attempts: 1,
                status: "exit code 1".to_string(),
            },
            HealthgateError::ChildCrashAfterReady("exit code 137".to_string()),
        ];

        let codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes, vec![2, 3, 4, 5, 6]);
        assert_eq!(
            HealthgateError::ConfigError("bad".to_string()).exit_code(),
            1
        );
    }

    #[test]
    fn test_log_tail_only_for_child_failures() {
        assert!(!HealthgateError::PortConflict(8000).wants_log_tail());
        assert!(!HealthgateError::LaunchFailure("x".to_string()).wants_log_tail());
        assert!(HealthgateError::ChildCrashAfterReady("x".to_string()).wants_log_tail());
    }
}
