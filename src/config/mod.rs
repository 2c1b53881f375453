use crate::error::{HealthgateError, Result};
use crate::health::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod duration_str;

/// Supervisor configuration: what to launch and how to gate and watch it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Service name, used for log file naming
    #[serde(default = "default_name")]
    pub name: String,

    /// Executable to launch (absolute path or a name resolved via PATH)
    #[serde(default)]
    pub command: PathBuf,

    /// Command-line arguments; `{host}`, `{port}`, `{workers}` and
    /// `{keep_alive}` are substituted at launch
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables for the child
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Bind address handed to the child
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port the child listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Worker count handed to the child
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Keep-alive timeout handed to the child
    #[serde(default = "default_keep_alive", with = "duration_str")]
    pub keep_alive: Duration,

    /// Path of the health endpoint
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Timeout of a single health request
    #[serde(default = "default_request_timeout", with = "duration_str")]
    pub request_timeout: Duration,

    /// Health gate retry policy
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Interval between liveness probes once ready
    #[serde(default = "default_liveness_interval", with = "duration_str")]
    pub liveness_interval: Duration,

    /// Time the child gets to exit after a forwarded signal before it is killed
    #[serde(default = "default_shutdown_grace", with = "duration_str")]
    pub shutdown_grace: Duration,

    /// Wait for the child indefinitely on shutdown instead of killing it
    #[serde(default)]
    pub wait_forever: bool,

    /// Directory for the dated log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Number of log lines echoed when startup or the child fails
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,

    /// Module search path variable extended for the child
    #[serde(default = "default_search_path_var")]
    pub search_path_var: String,

    /// Entries prepended to the search path variable
    #[serde(default)]
    pub search_path: Vec<PathBuf>,

    /// Variable set to "1" to disable output buffering in the child
    #[serde(default = "default_unbuffered_var")]
    pub unbuffered_var: Option<String>,
}

// Default value functions for serde
fn default_name() -> String {
    "app".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_workers() -> u32 {
    1
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(120)
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_liveness_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_tail_lines() -> usize {
    50
}

fn default_search_path_var() -> String {
    "PYTHONPATH".to_string()
}

fn default_unbuffered_var() -> Option<String> {
    Some("PYTHONUNBUFFERED".to_string())
}

impl SupervisorConfig {
    /// Create a configuration with defaults for everything but the command
    pub fn new(name: impl Into<String>, command: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            keep_alive: default_keep_alive(),
            health_path: default_health_path(),
            request_timeout: default_request_timeout(),
            retry: RetryPolicy::default(),
            liveness_interval: default_liveness_interval(),
            shutdown_grace: default_shutdown_grace(),
            wait_forever: false,
            log_dir: default_log_dir(),
            log_tail_lines: default_log_tail_lines(),
            search_path_var: default_search_path_var(),
            search_path: Vec::new(),
            unbuffered_var: default_unbuffered_var(),
        }
    }

    /// Load a configuration from a file (supports TOML and JSON)
    ///
    /// The result is env-expanded but not validated, so CLI overrides can be
    /// applied before calling [`SupervisorConfig::validate`].
    pub fn from_file(path: &Path) -> Result<SupervisorConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HealthgateError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(HealthgateError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<SupervisorConfig> {
        toml::from_str(contents)
            .map_err(|e| HealthgateError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<SupervisorConfig> {
        serde_json::from_str(contents)
            .map_err(|e| HealthgateError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(HealthgateError::MissingConfigField("name".to_string()));
        }

        if self.command.as_os_str().is_empty() {
            return Err(HealthgateError::MissingConfigField("command".to_string()));
        }

        if self.port == 0 {
            return Err(HealthgateError::ConfigValidationError(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(HealthgateError::ConfigValidationError(
                "workers must be at least 1".to_string(),
            ));
        }

        if !self.health_path.starts_with('/') {
            return Err(HealthgateError::ConfigValidationError(format!(
                "health_path must start with '/': {}",
                self.health_path
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(HealthgateError::ConfigValidationError(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.liveness_interval.is_zero() {
            return Err(HealthgateError::ConfigValidationError(
                "liveness_interval must be greater than zero".to_string(),
            ));
        }

        self.retry.validate()?;

        if let Some(ref cwd) = self.cwd {
            if !cwd.is_dir() {
                return Err(HealthgateError::ConfigValidationError(format!(
                    "Working directory does not exist or is not a directory: {}",
                    cwd.display()
                )));
            }
        }

        Ok(())
    }

    /// Arguments with the launch placeholders substituted
    pub fn rendered_args(&self) -> Vec<String> {
        let port = self.port.to_string();
        let workers = self.workers.to_string();
        let keep_alive = self.keep_alive.as_secs().to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{host}", &self.host)
                    .replace("{port}", &port)
                    .replace("{workers}", &workers)
                    .replace("{keep_alive}", &keep_alive)
            })
            .collect()
    }

    /// Loopback address the health gate and preflight probe
    pub fn probe_address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Full health endpoint URL, for display
    pub fn health_url(&self) -> String {
        format!("http://{}{}", self.probe_address(), self.health_path)
    }

    /// Grace period before a forced kill, or `None` to wait indefinitely
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.wait_forever {
            None
        } else {
            Some(self.shutdown_grace)
        }
    }

    fn expand_env_vars(&mut self) {
        self.command = Self::expand_env_in_path(&self.command);

        if let Some(ref cwd) = self.cwd {
            self.cwd = Some(Self::expand_env_in_path(cwd));
        }

        self.args = self
            .args
            .iter()
            .map(|arg| Self::expand_env_in_string(arg))
            .collect();

        self.env = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), Self::expand_env_in_string(v)))
            .collect();
    }

    /// Expand `$VAR` and `${VAR}` references from the process environment
    ///
    /// A bare `$VAR` name runs to the first character that cannot appear in
    /// an identifier. Unset variables and anything that is not a valid name
    /// are left as written.
    fn expand_env_in_string(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;

        while let Some(pos) = rest.find('$') {
            result.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let (name, braced, remainder) = match after.strip_prefix('{') {
                Some(inner) => match inner.find('}') {
                    Some(end) => (&inner[..end], true, &inner[end + 1..]),
                    None => ("", true, after),
                },
                None => {
                    let end = after
                        .find(|c: char| !is_env_name_char(c))
                        .unwrap_or(after.len());
                    (&after[..end], false, &after[end..])
                }
            };

            if !is_env_name(name) {
                result.push('$');
                rest = after;
                continue;
            }

            match std::env::var(name) {
                Ok(value) => result.push_str(&value),
                Err(_) if braced => {
                    result.push_str("${");
                    result.push_str(name);
                    result.push('}');
                }
                Err(_) => {
                    result.push('$');
                    result.push_str(name);
                }
            }
            rest = remainder;
        }

        result.push_str(rest);
        result
    }

    fn expand_env_in_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        PathBuf::from(Self::expand_env_in_string(&path_str))
    }
}

fn is_env_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_env_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && name.chars().all(is_env_name_char)
}
