//! Automatic snapshot scheduling
//!
//! A single tokio task ticks at the configured interval and sends capture
//! requests to the owner of the snapshot store. Changing the interval aborts
//! the running task before a new one is spawned, and every request carries
//! the generation it was issued under so a request from an aborted task can
//! be recognised and dropped.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Supported auto-capture intervals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotInterval {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "10m")]
    TenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl SnapshotInterval {
    pub const ALL: [SnapshotInterval; 8] = [
        SnapshotInterval::Off,
        SnapshotInterval::OneMinute,
        SnapshotInterval::FiveMinutes,
        SnapshotInterval::TenMinutes,
        SnapshotInterval::ThirtyMinutes,
        SnapshotInterval::OneHour,
        SnapshotInterval::SixHours,
        SnapshotInterval::TwentyFourHours,
    ];

    /// Period between captures, `None` when off
    pub fn period(&self) -> Option<Duration> {
        let minutes = match self {
            SnapshotInterval::Off => return None,
            SnapshotInterval::OneMinute => 1,
            SnapshotInterval::FiveMinutes => 5,
            SnapshotInterval::TenMinutes => 10,
            SnapshotInterval::ThirtyMinutes => 30,
            SnapshotInterval::OneHour => 60,
            SnapshotInterval::SixHours => 6 * 60,
            SnapshotInterval::TwentyFourHours => 24 * 60,
        };
        Some(Duration::from_secs(minutes * 60))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotInterval::Off => "off",
            SnapshotInterval::OneMinute => "1m",
            SnapshotInterval::FiveMinutes => "5m",
            SnapshotInterval::TenMinutes => "10m",
            SnapshotInterval::ThirtyMinutes => "30m",
            SnapshotInterval::OneHour => "1h",
            SnapshotInterval::SixHours => "6h",
            SnapshotInterval::TwentyFourHours => "24h",
        }
    }
}

impl std::fmt::Display for SnapshotInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotInterval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown snapshot interval '{}', expected off|1m|5m|10m|30m|1h|6h|24h",
                    s
                )
            })
    }
}

/// A capture request emitted by the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledCapture {
    pub interval: SnapshotInterval,
    pub generation: u64,
    /// 1-based firing count within this generation
    pub sequence: u64,
}

/// Cancellable, reconfigurable auto-capture timer
pub struct SnapshotSchedule {
    interval: SnapshotInterval,
    generation: u64,
    tx: mpsc::Sender<ScheduledCapture>,
    task: Option<JoinHandle<()>>,
}

impl SnapshotSchedule {
    /// Create a stopped schedule and the receiver its requests arrive on
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ScheduledCapture>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let schedule = Self {
            interval: SnapshotInterval::Off,
            generation: 0,
            tx,
            task: None,
        };
        (schedule, rx)
    }

    pub fn interval(&self) -> SnapshotInterval {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Whether a request belongs to the currently running schedule
    pub fn is_current(&self, capture: &ScheduledCapture) -> bool {
        self.task.is_some() && capture.generation == self.generation
    }

    /// Replace the schedule; `Off` just stops it
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_interval(&mut self, interval: SnapshotInterval) {
        self.stop();
        self.interval = interval;

        let Some(period) = interval.period() else {
            info!("Automatic snapshots disabled");
            return;
        };

        let tx = self.tx.clone();
        let generation = self.generation;
        info!(interval = %interval, "Starting automatic snapshot schedule");

        self.task = Some(tokio::spawn(async move {
            // First capture one full period after start
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut sequence = 0u64;

            loop {
                ticker.tick().await;
                sequence += 1;
                let request = ScheduledCapture {
                    interval,
                    generation,
                    sequence,
                };
                if tx.send(request).await.is_err() {
                    debug!("Snapshot receiver dropped, stopping schedule");
                    break;
                }
            }
        }));
    }

    /// Cancel the running task, if any
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(generation = self.generation, "Stopped snapshot schedule");
        }
        self.generation += 1;
    }
}

impl Drop for SnapshotSchedule {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
