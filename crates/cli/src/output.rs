//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if !bytes.is_finite() {
        return bytes.to_string();
    }

    let abs = bytes.abs();
    if abs >= GB {
        format!("{:.2}Gi", bytes / GB)
    } else if abs >= MB {
        format!("{:.2}Mi", bytes / MB)
    } else if abs >= KB {
        format!("{:.2}Ki", bytes / KB)
    } else {
        format!("{:.0}B", bytes)
    }
}

/// Format a core count, using millicores below one core
pub fn format_cores(cores: f64) -> String {
    if !cores.is_finite() {
        return cores.to_string();
    }

    if cores.abs() >= 1.0 || cores == 0.0 {
        format!("{:.2}", cores)
    } else {
        format!("{:.0}m", cores * 1000.0)
    }
}

/// Share of `total` taken by `usage`, as a percentage
pub fn format_share(usage: f64, total: f64) -> String {
    if total > 0.0 && total.is_finite() {
        format!("{:.1}%", usage / total * 100.0)
    } else {
        "-".to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(2048.0), "2.00Ki");
        assert_eq!(format_bytes(1.5 * 1024.0 * 1024.0), "1.50Mi");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.00Gi");
        assert_eq!(format_bytes(f64::INFINITY), "inf");
    }

    #[test]
    fn test_format_cores() {
        assert_eq!(format_cores(2.5), "2.50");
        assert_eq!(format_cores(0.25), "250m");
        assert_eq!(format_cores(0.0), "0.00");
    }

    #[test]
    fn test_format_share() {
        assert_eq!(format_share(90.0, 490.0), "18.4%");
        assert_eq!(format_share(1.0, 0.0), "-");
    }
}
