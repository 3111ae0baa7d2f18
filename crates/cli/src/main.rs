//! heapwatch CLI
//!
//! Queries a running heapwatch agent: live status and history, snapshots
//! and their comparison, forced GC and engine configuration.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{config as config_cmd, snapshots, status};
use heapwatch_lib::{Sensitivity, SnapshotInterval};

/// heapwatch CLI
#[derive(Parser)]
#[command(name = "hwctl")]
#[command(author, version, about = "CLI for the heapwatch memory agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (defaults to the config file, then http://localhost:9095)
    #[arg(long, env = "HWCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show current usage, severity and leak analysis
    Status,

    /// Show recent samples
    History {
        /// Only the newest N samples
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Request a garbage collection now
    Gc,

    /// Manage heap snapshots
    #[command(subcommand)]
    Snapshots(SnapshotCommands),

    /// View or change engine configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// List stored snapshots
    List,

    /// Capture a snapshot of the latest sample
    Capture {
        /// Snapshot label (auto-generated if omitted)
        #[arg(long, short)]
        label: Option<String>,
    },

    /// Delete a snapshot
    Delete {
        /// Snapshot ID
        id: u64,
    },

    /// Compare two snapshots
    Compare {
        /// Earlier snapshot ID
        a: u64,
        /// Later snapshot ID
        b: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the engine configuration
    Show,

    /// Set leak detection sensitivity (low, medium, high)
    SetSensitivity {
        level: Sensitivity,
    },

    /// Set the automatic snapshot interval (off, 1m, 5m, 10m, 30m, 1h, 6h, 24h)
    SetSchedule {
        interval: SnapshotInterval,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::Config::load()?;
    let api_url = settings.resolve_api_url(cli.api_url.as_deref());
    let format = settings.resolve_format(cli.format);

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Status => status::show_status(&client, format).await?,
        Commands::History { limit } => status::show_history(&client, limit, format).await?,
        Commands::Gc => status::force_gc(&client, format).await?,
        Commands::Snapshots(cmd) => match cmd {
            SnapshotCommands::List => snapshots::list(&client, format).await?,
            SnapshotCommands::Capture { label } => {
                snapshots::capture(&client, label, format).await?
            }
            SnapshotCommands::Delete { id } => snapshots::delete(&client, id).await?,
            SnapshotCommands::Compare { a, b } => {
                snapshots::compare(&client, a, b, format).await?
            }
        },
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => config_cmd::show(&client, format).await?,
            ConfigCommands::SetSensitivity { level } => {
                config_cmd::set_sensitivity(&client, level, format).await?
            }
            ConfigCommands::SetSchedule { interval } => {
                config_cmd::set_schedule(&client, interval, format).await?
            }
        },
    }

    Ok(())
}
