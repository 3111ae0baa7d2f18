//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use heapwatch_lib::{Severity, Trend};
use serde::Serialize;
use std::str::FromStr;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <OutputFormat as ValueEnum>::from_str(s, true)
    }
}

/// Pretty-print any response as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows with the standard table style
pub fn render_table<T: tabled::Tabled>(rows: Vec<T>) -> String {
    tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string()
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Signed byte delta, e.g. `+1.50Mi`
pub fn format_signed_bytes(diff: f64) -> String {
    let sign = if diff < 0.0 { "-" } else { "+" };
    format!("{}{}", sign, format_bytes(diff.abs().round() as u64))
}

/// A zero limit means unknown
pub fn format_limit(limit: u64) -> String {
    if limit == 0 {
        "-".to_string()
    } else {
        format_bytes(limit)
    }
}

/// Epoch milliseconds as UTC time
pub fn format_timestamp(ms: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

pub fn color_severity(severity: Severity) -> String {
    let text = severity.to_string();
    match severity {
        Severity::Normal => text.green().to_string(),
        Severity::Warning => text.yellow().to_string(),
        Severity::Critical => text.red().bold().to_string(),
    }
}

pub fn color_trend(trend: Trend) -> String {
    let text = trend.to_string();
    match trend {
        Trend::Increasing => text.yellow().to_string(),
        Trend::Stable => text.normal().to_string(),
        Trend::Decreasing => text.green().to_string(),
    }
}

/// Leak probability, red when flagged as a leak
pub fn color_probability(probability: f64, leaking: bool) -> String {
    let formatted = format!("{:.0}%", probability);
    if leaking {
        formatted.red().bold().to_string()
    } else if probability >= 40.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}
