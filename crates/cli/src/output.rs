//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Pretty-print any response as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a rounded table, or a notice when there are no rows
pub fn print_rows<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "-".repeat(50));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn format_days(days: f64) -> String {
    format!("{:.1} d", days)
}

pub fn format_percent(pct: f64) -> String {
    format!("{:.1}%", pct)
}

/// Signed percentage, e.g. budget variance
pub fn format_signed_percent(pct: f64) -> String {
    format!("{:+.1}%", pct)
}

/// Date part of an RFC 3339 timestamp
pub fn format_timestamp(ts: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => ts.to_string(),
    }
}

/// Color a commentary tier or model status
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "good" | "trained" | "predicted" | "yes" => status.green().to_string(),
        "fair" | "skipped" => status.yellow().to_string(),
        "poor" | "failed" | "unavailable" | "no" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatters() {
        assert_eq!(format_days(37.24), "37.2 d");
        assert_eq!(format_percent(12.345), "12.3%");
        assert_eq!(format_signed_percent(4.0), "+4.0%");
        assert_eq!(format_signed_percent(-2.5), "-2.5%");
        assert_eq!(format_timestamp("2024-05-01T10:00:00Z"), "2024-05-01 10:00:00");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }
}
