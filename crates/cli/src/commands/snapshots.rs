//! Snapshot commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_severity, format_bytes, format_limit, format_signed_bytes, format_timestamp,
    print_json, print_success, print_warning, render_table, OutputFormat,
};
use heapwatch_lib::snapshot::{Direction, FieldDelta};
use heapwatch_lib::{Snapshot, SnapshotComparison};

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Time (UTC)")]
    time: String,
    #[tabled(rename = "Used")]
    used: String,
    #[tabled(rename = "Limit")]
    limit: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Leak")]
    leak: String,
    #[tabled(rename = "Auto")]
    auto: String,
}

#[derive(Tabled)]
struct DeltaRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
    #[tabled(rename = "Change")]
    change: String,
}

fn snapshot_row(s: &Snapshot) -> SnapshotRow {
    SnapshotRow {
        id: s.id,
        label: s.label.clone(),
        time: format_timestamp(s.timestamp),
        used: format_bytes(s.heap_used),
        limit: format_limit(s.heap_limit),
        severity: color_severity(s.analysis_context.severity),
        leak: format!("{:.0}%", s.analysis_context.leak_probability),
        auto: if s.is_auto { "yes" } else { "no" }.to_string(),
    }
}

pub async fn list(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let snapshots = client.list_snapshots().await?;

    match format {
        OutputFormat::Json => print_json(&snapshots)?,
        OutputFormat::Table => {
            if snapshots.is_empty() {
                print_warning("No snapshots stored");
                return Ok(());
            }
            let rows: Vec<SnapshotRow> = snapshots.iter().map(snapshot_row).collect();
            println!("{}", render_table(rows));
            println!("\nTotal: {} snapshots", snapshots.len());
        }
    }

    Ok(())
}

pub async fn capture(client: &ApiClient, label: Option<String>, format: OutputFormat) -> Result<()> {
    let snapshot = client.capture_snapshot(label.as_deref()).await?;

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => print_success(&format!(
            "Captured snapshot {} \"{}\" ({} used)",
            snapshot.id,
            snapshot.label,
            format_bytes(snapshot.heap_used)
        )),
    }

    Ok(())
}

pub async fn delete(client: &ApiClient, id: u64) -> Result<()> {
    client.delete_snapshot(id).await?;
    print_success(&format!("Deleted snapshot {}", id));
    Ok(())
}

enum Unit {
    Bytes,
    Count,
    Percent,
}

fn render_value(value: f64, unit: &Unit) -> String {
    match unit {
        Unit::Bytes => format_bytes(value.max(0.0).round() as u64),
        Unit::Count => format!("{:.0}", value),
        Unit::Percent => format!("{:.1}%", value),
    }
}

fn delta_row(field: &'static str, delta: &FieldDelta, unit: Unit) -> DeltaRow {
    match delta {
        FieldDelta::NotAvailable => DeltaRow {
            field,
            before: "-".to_string(),
            after: "-".to_string(),
            change: "n/a".dimmed().to_string(),
        },
        FieldDelta::Available {
            before,
            after,
            diff,
            percentage,
            direction,
        } => {
            let amount = match unit {
                Unit::Bytes => format_signed_bytes(*diff),
                Unit::Count => format!("{:+.0}", diff),
                Unit::Percent => format!("{:+.1} pts", diff),
            };
            let text = match percentage {
                Some(p) => format!("{} ({:+.1}%)", amount, p),
                None => amount,
            };
            let change = match direction {
                Direction::Up => text.red().to_string(),
                Direction::Down => text.green().to_string(),
                Direction::Unchanged => text.normal().to_string(),
            };
            DeltaRow {
                field,
                before: render_value(*before, &unit),
                after: render_value(*after, &unit),
                change,
            }
        }
    }
}

fn comparison_rows(cmp: &SnapshotComparison) -> Vec<DeltaRow> {
    vec![
        delta_row("Heap used", &cmp.heap_used, Unit::Bytes),
        delta_row("Heap total", &cmp.heap_total, Unit::Bytes),
        delta_row("Heap limit", &cmp.heap_limit, Unit::Bytes),
        delta_row("DOM nodes", &cmp.dom_nodes, Unit::Count),
        delta_row("Listeners", &cmp.event_listeners, Unit::Count),
        delta_row("Usage", &cmp.usage_percentage, Unit::Percent),
        delta_row("Leak probability", &cmp.leak_probability, Unit::Percent),
    ]
}

pub async fn compare(client: &ApiClient, a: u64, b: u64, format: OutputFormat) -> Result<()> {
    let comparison = client.compare_snapshots(a, b).await?;

    match format {
        OutputFormat::Json => print_json(&comparison)?,
        OutputFormat::Table => {
            println!(
                "Snapshot {} → {} ({:.1}s apart)",
                comparison.from_id,
                comparison.to_id,
                comparison.elapsed_ms as f64 / 1000.0
            );
            println!("{}", render_table(comparison_rows(&comparison)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_row_bytes() {
        let row = delta_row(
            "Heap used",
            &FieldDelta::between(Some(1024.0 * 1024.0), Some(1536.0 * 1024.0)),
            Unit::Bytes,
        );
        assert_eq!(row.before, "1.00Mi");
        assert_eq!(row.after, "1.50Mi");
        assert!(row.change.contains("+512.00Ki"));
        assert!(row.change.contains("+50.0%"));
    }

    #[test]
    fn test_delta_row_not_available() {
        let row = delta_row("DOM nodes", &FieldDelta::NotAvailable, Unit::Count);
        assert_eq!(row.before, "-");
        assert!(row.change.contains("n/a"));
    }
}
