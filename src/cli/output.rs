// Output formatting and display for CLI

use crate::config::{duration_str, SupervisorConfig};
use crate::supervisor::ReadySummary;
use colored::*;
use std::path::Path;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Setting")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl FieldRow {
    fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

fn print_table(rows: Vec<FieldRow>) {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print the banner shown once the server passes its health check
pub fn print_ready_summary(summary: &ReadySummary) {
    println!(
        "{}",
        format!("✓ {} is ready", summary.name).green().bold()
    );

    let rows = vec![
        FieldRow::new("PID", summary.pid),
        FieldRow::new("Port", summary.port),
        FieldRow::new("Health", &summary.health_url),
        FieldRow::new("Attempts", summary.attempts),
        FieldRow::new("Startup", format_duration(&summary.startup_time)),
        FieldRow::new(
            "Memory",
            summary
                .memory
                .map(format_memory)
                .unwrap_or_else(|| "-".to_string()),
        ),
        FieldRow::new("Log file", summary.log_path.display()),
    ];
    print_table(rows);
}

/// Print the effective configuration
pub fn print_config(config: &SupervisorConfig) {
    let command = std::iter::once(config.command.display().to_string())
        .chain(config.rendered_args())
        .collect::<Vec<_>>()
        .join(" ");

    let rows = vec![
        FieldRow::new("Name", &config.name),
        FieldRow::new("Command", truncate(&command, 60)),
        FieldRow::new(
            "Working dir",
            config
                .cwd
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        FieldRow::new("Bind", format!("{}:{}", config.host, config.port)),
        FieldRow::new("Workers", config.workers),
        FieldRow::new("Health URL", config.health_url()),
        FieldRow::new(
            "Request timeout",
            duration_str::format(config.request_timeout),
        ),
        FieldRow::new(
            "Retry",
            format!(
                "{} attempts, {} +{} (max {})",
                config.retry.max_attempts,
                duration_str::format(config.retry.initial_delay),
                duration_str::format(config.retry.delay_increment),
                duration_str::format(config.retry.max_delay)
            ),
        ),
        FieldRow::new(
            "Worst-case wait",
            format_duration(&config.retry.worst_case_sleep()),
        ),
        FieldRow::new(
            "Liveness interval",
            duration_str::format(config.liveness_interval),
        ),
        FieldRow::new(
            "Shutdown grace",
            config
                .shutdown_grace()
                .map(duration_str::format)
                .unwrap_or_else(|| "unbounded".to_string()),
        ),
        FieldRow::new("Log dir", config.log_dir.display()),
    ];

    println!("\n{}", "Configuration".bold().underline());
    print_table(rows);
}

/// Print lines read from a log file
pub fn print_logs(path: &Path, lines: &[String]) {
    if lines.is_empty() {
        println!(
            "{}",
            format!("No logs available in {}", path.display()).yellow()
        );
        return;
    }

    println!("\n{}", path.display().to_string().bold().underline());
    println!();

    for line in lines {
        if line.contains("] [err] ") {
            println!("{}", line.red());
        } else if line.contains("] [supervisor] ") {
            println!("{}", line.cyan());
        } else {
            println!("{}", line);
        }
    }

    println!();
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

/// Format memory usage in human-readable format
fn format_memory(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    }
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(&Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(&Duration::from_secs(104)), "1m 44s");
        assert_eq!(format_duration(&Duration::from_secs(3700)), "1h 1m");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(512), "512B");
        assert_eq!(format_memory(2048), "2.0KB");
        assert_eq!(format_memory(2 * 1024 * 1024), "2.0MB");
        assert_eq!(format_memory(3 * 1024 * 1024 * 1024), "3.00GB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a very long string", 10), "this is...");
        assert_eq!(truncate("ééééééééééé", 5), "éé...");
    }
}
