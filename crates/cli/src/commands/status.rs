//! Live status, history and GC commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, StatusResponse};
use crate::output::{
    color_probability, color_severity, color_trend, format_bytes, format_limit, format_percent,
    format_timestamp, print_info, print_json, print_success, print_warning, render_table,
    OutputFormat,
};
use heapwatch_lib::analysis::AnalysisStatus;
use heapwatch_lib::{GcTrigger, Sample};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Time (UTC)")]
    time: String,
    #[tabled(rename = "Used")]
    used: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Limit")]
    limit: String,
    #[tabled(rename = "Usage")]
    usage: String,
}

fn row(field: &'static str, value: impl Into<String>) -> FieldRow {
    FieldRow {
        field,
        value: value.into(),
    }
}

fn describe_status(status: &AnalysisStatus) -> String {
    match status {
        AnalysisStatus::Complete => "complete".to_string(),
        AnalysisStatus::Disabled => "disabled".to_string(),
        AnalysisStatus::InsufficientSamples { have, need } => {
            format!("collecting samples ({}/{})", have, need)
        }
        AnalysisStatus::InsufficientObservation {
            observed_secs,
            required_secs,
        } => format!("observing ({:.0}s/{:.0}s)", observed_secs, required_secs),
    }
}

fn status_rows(status: &StatusResponse) -> Vec<FieldRow> {
    let analysis = &status.analysis;
    let mut rows = vec![row("Source", status.source.clone())];

    match &status.sample {
        Some(sample) => {
            rows.push(row("Heap used", format_bytes(sample.used)));
            rows.push(row("Heap total", format_bytes(sample.total)));
            rows.push(row("Heap limit", format_limit(sample.limit)));
            rows.push(row("Usage", format_percent(status.usage_percentage)));
            if let Some(nodes) = sample.dom_nodes {
                rows.push(row("DOM nodes", nodes.to_string()));
            }
            if let Some(listeners) = sample.listeners {
                rows.push(row("Listeners", listeners.to_string()));
            }
        }
        None => rows.push(row("Heap used", "-")),
    }

    rows.push(row("Severity", color_severity(status.severity)));
    rows.push(row("Trend", color_trend(analysis.trend)));
    rows.push(row(
        "Leak probability",
        color_probability(analysis.probability, analysis.is_leaking),
    ));
    rows.push(row("Analysis", describe_status(&analysis.status)));
    rows.push(row("Growth/sample", format!("{:.0} B", analysis.slope)));
    if let Some(bps) = analysis.bytes_per_second {
        rows.push(row("Growth/sec", format!("{:.0} B", bps)));
    }
    rows.push(row("R²", format!("{:.3}", analysis.r_squared)));
    rows.push(row("GC events", analysis.gc_event_count.to_string()));
    rows.push(row(
        "History",
        format!("{}/{}", status.history_len, status.history_capacity),
    ));
    rows.push(row("Snapshots", status.snapshot_count.to_string()));
    rows.push(row(
        "Last GC",
        status
            .last_gc_at
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string()),
    ));
    rows
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("{}", render_table(status_rows(&status)));
            if let Some(recommendation) = &status.analysis.recommendation {
                if status.analysis.is_leaking {
                    print_warning(recommendation);
                } else {
                    print_info(recommendation);
                }
            }
        }
    }

    Ok(())
}

fn sample_row(sample: &Sample) -> SampleRow {
    SampleRow {
        time: format_timestamp(sample.timestamp),
        used: format_bytes(sample.used),
        total: format_bytes(sample.total),
        limit: format_limit(sample.limit),
        usage: sample
            .usage_ratio()
            .map(|r| format_percent(r * 100.0))
            .unwrap_or_else(|| "-".to_string()),
    }
}

pub async fn show_history(client: &ApiClient, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let samples = client.history(limit).await?;

    match format {
        OutputFormat::Json => print_json(&samples)?,
        OutputFormat::Table => {
            if samples.is_empty() {
                print_warning("No samples recorded yet");
                return Ok(());
            }
            let rows: Vec<SampleRow> = samples.iter().map(sample_row).collect();
            println!("{}", render_table(rows));
            println!("\nTotal: {} samples", samples.len());
        }
    }

    Ok(())
}

pub async fn force_gc(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let request = client.force_gc().await?;

    match format {
        OutputFormat::Json => print_json(&request)?,
        OutputFormat::Table => {
            let how = match request.trigger {
                GcTrigger::Forced => "Forced",
                GcTrigger::Automatic => "Automatic",
            };
            print_success(&format!(
                "{} GC requested at {} usage",
                how,
                format_percent(request.usage_percentage)
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapwatch_lib::{GcState, MemoryEngine};

    #[test]
    fn test_status_rows_cover_sample_and_analysis() {
        let mut engine = MemoryEngine::default();
        let report = engine.tick(Sample::new(0, 2048, 4096, 0).with_dom_nodes(12));
        let status = StatusResponse {
            source: "push".to_string(),
            sample: Some(report.sample),
            usage_percentage: report.usage_percentage,
            severity: report.severity,
            analysis: report.analysis,
            gc_state: GcState::Idle,
            last_gc_at: None,
            history_len: 1,
            history_capacity: 50,
            snapshot_count: 0,
            ticks: 1,
        };

        let rows = status_rows(&status);
        let value = |name: &str| {
            rows.iter()
                .find(|r| r.field == name)
                .map(|r| r.value.clone())
        };
        assert_eq!(value("Heap used").as_deref(), Some("2.00Ki"));
        assert_eq!(value("Heap limit").as_deref(), Some("-"));
        assert_eq!(value("DOM nodes").as_deref(), Some("12"));
        assert_eq!(value("Analysis").as_deref(), Some("collecting samples (1/10)"));
        assert_eq!(value("Last GC").as_deref(), Some("never"));
    }

    #[test]
    fn test_sample_row_without_limit() {
        let row = sample_row(&Sample::new(0, 10, 20, 0));
        assert_eq!(row.usage, "-");
        assert_eq!(row.limit, "-");
    }
}
