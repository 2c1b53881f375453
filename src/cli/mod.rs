// CLI module - User-facing command-line interface

pub mod output;

use crate::config::SupervisorConfig;
use crate::error::{HealthgateError, Result};
use crate::logs::{log_file_path, read_last_lines};
use crate::preflight;
use crate::signals;
use crate::supervisor::Supervisor;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// healthgate - launch a server, gate on its health endpoint, keep it alive
#[derive(Parser)]
#[command(name = "healthgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads the configuration
#[derive(Args, Clone, Default)]
struct ConfigArgs {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service name (used for the log file name)
    #[arg(short, long)]
    name: Option<String>,

    /// Directory for the dated log file
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the server and supervise it until shutdown
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Bind address handed to the server
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port the server listens on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Worker count handed to the server
        #[arg(short, long, env = "WORKERS")]
        workers: Option<u32>,

        /// Working directory for the server
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Environment variables (KEY=VALUE format)
        #[arg(short, long)]
        env: Vec<String>,

        /// Command and arguments to launch
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Check whether a port is free
    CheckPort {
        /// Port to probe
        port: u16,
    },

    /// Print the tail of today's log file
    Logs {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of lines to display
        #[arg(short, long, default_value = "50")]
        lines: usize,
    },

    /// Validate and print the effective configuration
    ShowConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

impl Cli {
    /// Run the CLI application
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        init_tracing(&cli.log_level);
        cli.execute().await
    }

    async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                config,
                host,
                port,
                workers,
                cwd,
                env,
                command,
            } => {
                let mut settings = load_config(&config)?;

                if let Some(host) = host {
                    settings.host = host;
                }
                if let Some(port) = port {
                    settings.port = port;
                }
                if let Some(workers) = workers {
                    settings.workers = workers;
                }
                if cwd.is_some() {
                    settings.cwd = cwd;
                }
                settings.env.extend(parse_env_vars(&env)?);
                if let Some((program, args)) = command.split_first() {
                    settings.command = PathBuf::from(program);
                    settings.args = args.to_vec();
                }
                settings.validate()?;

                output::print_info(&format!(
                    "Starting {} on port {}",
                    settings.name, settings.port
                ));

                let signals = signals::listen()?;
                let exit = Supervisor::new(settings)
                    .on_ready(output::print_ready_summary)
                    .run(signals)
                    .await?;

                output::print_success_msg(&format!(
                    "Shut down after {}; server exited with {}",
                    exit.signal, exit.child_status
                ));
                Ok(())
            }

            Commands::CheckPort { port } => {
                preflight::check_port(port).await?;
                output::print_success_msg(&format!("Port {} is available", port));
                Ok(())
            }

            Commands::Logs { config, lines } => {
                let settings = load_config(&config)?;
                let path = log_file_path(
                    &settings.log_dir,
                    &settings.name,
                    chrono::Local::now().date_naive(),
                );
                let tail = read_last_lines(&path, lines).await?;
                output::print_logs(&path, &tail);
                Ok(())
            }

            Commands::ShowConfig { config } => {
                let settings = load_config(&config)?;
                settings.validate()?;
                output::print_config(&settings);
                Ok(())
            }
        }
    }
}

/// Install the stderr tracing subscriber; RUST_LOG wins over `level`
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the configuration file if given and apply the shared overrides
fn load_config(args: &ConfigArgs) -> Result<SupervisorConfig> {
    let mut config = match args.config {
        Some(ref path) => SupervisorConfig::from_file(path)?,
        None => SupervisorConfig::new("app", ""),
    };

    if let Some(ref name) = args.name {
        config.name = name.clone();
    }
    if let Some(ref log_dir) = args.log_dir {
        config.log_dir = log_dir.clone();
    }

    Ok(config)
}

/// Parse environment variables from KEY=VALUE format
fn parse_env_vars(env_vars: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for env_str in env_vars {
        if let Some((key, value)) = env_str.split_once('=') {
            map.insert(key.to_string(), value.to_string());
        } else {
            return Err(HealthgateError::ConfigError(format!(
                "Invalid environment variable format: '{}'. Expected KEY=VALUE",
                env_str
            )));
        }
    }

    Ok(map)
}
