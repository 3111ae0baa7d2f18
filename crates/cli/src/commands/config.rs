//! Engine configuration commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{print_json, print_success, render_table, OutputFormat};
use heapwatch_lib::{EngineConfig, Sensitivity, SnapshotInterval};

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    setting: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn setting(setting: &'static str, value: impl ToString) -> SettingRow {
    SettingRow {
        setting,
        value: value.to_string(),
    }
}

fn config_rows(config: &EngineConfig) -> Vec<SettingRow> {
    vec![
        setting("Polling interval", format!("{} ms", config.polling_interval_ms)),
        setting("Warning threshold", format!("{}%", config.warning_threshold)),
        setting("Critical threshold", format!("{}%", config.critical_threshold)),
        setting("Auto GC", if config.auto_gc.enabled { "on" } else { "off" }),
        setting(
            "Auto GC threshold",
            config
                .auto_gc
                .threshold
                .map(|t| format!("{}%", t))
                .unwrap_or_else(|| "-".to_string()),
        ),
        setting("Auto GC cooldown", format!("{} ms", config.auto_gc.cooldown_ms)),
        setting(
            "Leak detection",
            if config.leak_detection.enabled { "on" } else { "off" },
        ),
        setting("Sensitivity", config.leak_detection.sensitivity),
        setting("History capacity", config.history_capacity),
        setting("Max snapshots", config.snapshots.max_snapshots),
        setting("Auto snapshots", config.snapshots.auto_interval),
        setting(
            "Evict oldest",
            if config.snapshots.auto_evict { "yes" } else { "no" },
        ),
    ]
}

fn print_config(config: &EngineConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Table => {
            println!("{}", render_table(config_rows(config)));
            Ok(())
        }
    }
}

pub async fn show(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let config = client.config().await?;
    print_config(&config, format)
}

/// Read-modify-write so other settings are preserved
async fn update(
    client: &ApiClient,
    format: OutputFormat,
    change: impl FnOnce(&mut EngineConfig),
) -> Result<EngineConfig> {
    let mut config = client.config().await?;
    change(&mut config);
    let applied = client.update_config(&config).await?;
    if format == OutputFormat::Json {
        print_json(&applied)?;
    }
    Ok(applied)
}

pub async fn set_sensitivity(
    client: &ApiClient,
    sensitivity: Sensitivity,
    format: OutputFormat,
) -> Result<()> {
    let applied = update(client, format, |c| c.leak_detection.sensitivity = sensitivity).await?;
    if format == OutputFormat::Table {
        print_success(&format!(
            "Leak sensitivity set to {}",
            applied.leak_detection.sensitivity
        ));
    }
    Ok(())
}

pub async fn set_schedule(
    client: &ApiClient,
    interval: SnapshotInterval,
    format: OutputFormat,
) -> Result<()> {
    let applied = update(client, format, |c| c.snapshots.auto_interval = interval).await?;
    if format == OutputFormat::Table {
        match applied.snapshots.auto_interval {
            SnapshotInterval::Off => print_success("Automatic snapshots disabled"),
            every => print_success(&format!("Automatic snapshots every {}", every)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rows() {
        let rows = config_rows(&EngineConfig::default());
        let value = |name: &str| {
            rows.iter()
                .find(|r| r.setting == name)
                .map(|r| r.value.clone())
                .unwrap()
        };
        assert_eq!(value("Sensitivity"), "medium");
        assert_eq!(value("Auto snapshots"), "off");
        assert_eq!(value("Auto GC threshold"), "-");
        assert_eq!(value("Warning threshold"), "70%");
    }
}
