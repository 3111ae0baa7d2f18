//! Heap sample sources
//!
//! A source produces the next [`Sample`] for the run loop:
//! - [`ProcSampleSource`] polls `/proc/<pid>/status` on an interval
//! - [`PushSampleSource`] waits for samples posted to the API

use anyhow::{Context, Result};
use async_trait::async_trait;
use heapwatch_lib::{RawSample, Sample};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

/// Producer of heap samples
#[async_trait]
pub trait SampleSource: Send {
    /// Wait for the next sample; `Ok(None)` once the source is exhausted
    ///
    /// Must be cancel-safe: the run loop races it against other work.
    async fn next_sample(&mut self) -> Result<Option<Sample>>;

    /// Change the polling cadence, ignored by sources that are not polled
    fn set_polling_interval(&mut self, _period: Duration) {}

    fn describe(&self) -> String;
}

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Reads one process's memory figures from procfs and cgroupfs
#[derive(Debug, Clone)]
struct ProcReader {
    pid: u32,
    proc_root: PathBuf,
    cgroup_root: PathBuf,
}

impl ProcReader {
    /// Memory limit: the cgroup limit when set, else physical memory
    async fn read_limit(&self) -> u64 {
        let pid_dir = self.proc_root.join(self.pid.to_string());

        if let Ok(content) = fs::read_to_string(pid_dir.join("cgroup")).await {
            if let Some(path) = ProcSampleSource::parse_cgroup_path(&content) {
                let max_file = self
                    .cgroup_root
                    .join(path.trim_start_matches('/'))
                    .join("memory.max");
                if let Ok(max) = fs::read_to_string(&max_file).await {
                    if let Some(limit) = ProcSampleSource::parse_memory_max(&max) {
                        return limit;
                    }
                }
            }
        }

        match fs::read_to_string(self.proc_root.join("meminfo")).await {
            Ok(content) => ProcSampleSource::parse_meminfo_total(&content).unwrap_or(0),
            Err(e) => {
                debug!(error = %e, "No meminfo, heap limit unknown");
                0
            }
        }
    }

    async fn read_sample(&self) -> Result<Sample> {
        let status_path = self.proc_root.join(format!("{}/status", self.pid));
        let content = fs::read_to_string(&status_path)
            .await
            .with_context(|| format!("Failed to read {}", status_path.display()))?;
        let (used, total) = ProcSampleSource::parse_status(&content)?;
        let limit = self.read_limit().await;

        Ok(Sample::new(now_ms(), used, total, limit))
    }
}

/// Samples a process's resident memory from procfs
///
/// Each read runs in its own task. A read still in flight when
/// `next_sample` is cancelled is picked up by the next call instead of
/// being lost.
pub struct ProcSampleSource {
    reader: ProcReader,
    ticker: Interval,
    period: Duration,
    pending: Option<JoinHandle<Result<Sample>>>,
}

impl ProcSampleSource {
    pub fn new(
        pid: u32,
        proc_root: impl Into<PathBuf>,
        cgroup_root: impl Into<PathBuf>,
        period: Duration,
    ) -> Self {
        Self {
            reader: ProcReader {
                pid,
                proc_root: proc_root.into(),
                cgroup_root: cgroup_root.into(),
            },
            ticker: new_ticker(period),
            period,
            pending: None,
        }
    }

    /// Parse `VmRSS` and `VmSize` (kB) from a status file, in bytes
    pub fn parse_status(content: &str) -> Result<(u64, u64)> {
        let mut rss = None;
        let mut size = None;

        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                rss = parse_kb(rest);
            } else if let Some(rest) = line.strip_prefix("VmSize:") {
                size = parse_kb(rest);
            }
        }

        let rss = rss.context("VmRSS missing from status")?;
        Ok((rss, size.unwrap_or(rss)))
    }

    /// `MemTotal` from meminfo, in bytes
    pub fn parse_meminfo_total(content: &str) -> Option<u64> {
        content
            .lines()
            .find_map(|line| line.strip_prefix("MemTotal:"))
            .and_then(parse_kb)
    }

    /// Numeric `memory.max`; `max` means unlimited
    pub fn parse_memory_max(content: &str) -> Option<u64> {
        content.trim().parse().ok()
    }

    /// The unified-hierarchy path from a `/proc/<pid>/cgroup` file
    pub fn parse_cgroup_path(content: &str) -> Option<String> {
        content.lines().find_map(|line| {
            let parts: Vec<&str> = line.splitn(3, ':').collect();
            (parts.len() == 3 && parts[0] == "0").then(|| parts[2].to_string())
        })
    }

    /// Read one sample immediately
    pub async fn read_sample(&self) -> Result<Sample> {
        self.reader.read_sample().await
    }
}

#[async_trait]
impl SampleSource for ProcSampleSource {
    async fn next_sample(&mut self) -> Result<Option<Sample>> {
        loop {
            if let Some(handle) = self.pending.as_mut() {
                let joined = handle.await;
                self.pending = None;
                let sample = joined.context("Sample read task failed")??;
                return Ok(Some(sample));
            }

            self.ticker.tick().await;
            let reader = self.reader.clone();
            self.pending = Some(tokio::spawn(async move { reader.read_sample().await }));
        }
    }

    fn set_polling_interval(&mut self, period: Duration) {
        if period != self.period {
            debug!(period_ms = period.as_millis() as u64, "Polling interval changed");
            self.period = period;
            self.ticker = new_ticker(period);
        }
    }

    fn describe(&self) -> String {
        format!("pid:{}", self.reader.pid)
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn parse_kb(value: &str) -> Option<u64> {
    value
        .split_whitespace()
        .next()?
        .parse::<u64>()
        .ok()
        .map(|kb| kb.saturating_mul(1024))
}

/// Sending half handed to the API
#[derive(Clone)]
pub struct SampleSender {
    tx: mpsc::Sender<Sample>,
}

impl SampleSender {
    /// Sanitize and queue a pushed sample; a zero timestamp is stamped now
    pub async fn push(&self, raw: RawSample) -> Result<Sample> {
        let mut sample = raw.sanitize();
        if sample.timestamp == 0 {
            sample.timestamp = now_ms();
        }
        self.tx
            .send(sample)
            .await
            .context("Sample loop is not running")?;
        Ok(sample)
    }
}

/// Yields samples pushed through a [`SampleSender`]
pub struct PushSampleSource {
    rx: mpsc::Receiver<Sample>,
}

impl PushSampleSource {
    pub fn channel(buffer: usize) -> (SampleSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (SampleSender { tx }, Self { rx })
    }
}

#[async_trait]
impl SampleSource for PushSampleSource {
    async fn next_sample(&mut self) -> Result<Option<Sample>> {
        Ok(self.rx.recv().await)
    }

    fn describe(&self) -> String {
        "push".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    const STATUS: &str = "Name:\tnode\nVmPeak:\t  900000 kB\nVmSize:\t  800000 kB\nVmRSS:\t  120000 kB\nThreads:\t11\n";

    fn fake_proc(pid: u32, cgroup_limit: Option<&str>) -> (TempDir, TempDir) {
        let proc_root = TempDir::new().unwrap();
        let cgroup_root = TempDir::new().unwrap();

        let pid_dir = proc_root.path().join(pid.to_string());
        stdfs::create_dir_all(&pid_dir).unwrap();
        stdfs::write(pid_dir.join("status"), STATUS).unwrap();
        stdfs::write(pid_dir.join("cgroup"), "0::/app.slice/app.service\n").unwrap();
        stdfs::write(
            proc_root.path().join("meminfo"),
            "MemTotal:       16000000 kB\nMemFree:         1000 kB\n",
        )
        .unwrap();

        if let Some(limit) = cgroup_limit {
            let dir = cgroup_root.path().join("app.slice/app.service");
            stdfs::create_dir_all(&dir).unwrap();
            stdfs::write(dir.join("memory.max"), limit).unwrap();
        }

        (proc_root, cgroup_root)
    }

    #[test]
    fn test_parse_status() {
        let (rss, size) = ProcSampleSource::parse_status(STATUS).unwrap();
        assert_eq!(rss, 120_000 * 1024);
        assert_eq!(size, 800_000 * 1024);
        assert!(ProcSampleSource::parse_status("Name:\tx\n").is_err());
    }

    #[test]
    fn test_parse_limits() {
        assert_eq!(ProcSampleSource::parse_memory_max("max\n"), None);
        assert_eq!(ProcSampleSource::parse_memory_max("536870912\n"), Some(536_870_912));
        assert_eq!(
            ProcSampleSource::parse_meminfo_total("MemTotal:  2048 kB\n"),
            Some(2048 * 1024)
        );
        assert_eq!(
            ProcSampleSource::parse_cgroup_path("0::/kubepods/pod1\n").as_deref(),
            Some("/kubepods/pod1")
        );
    }

    #[tokio::test]
    async fn test_reads_cgroup_limit() {
        let (proc_root, cgroup_root) = fake_proc(77, Some("536870912\n"));
        let source = ProcSampleSource::new(
            77,
            proc_root.path(),
            cgroup_root.path(),
            Duration::from_secs(1),
        );

        let sample = source.read_sample().await.unwrap();
        assert_eq!(sample.used, 120_000 * 1024);
        assert_eq!(sample.total, 800_000 * 1024);
        assert_eq!(sample.limit, 536_870_912);
        assert!(sample.timestamp > 0);
    }

    #[tokio::test]
    async fn test_unlimited_cgroup_falls_back_to_meminfo() {
        let (proc_root, cgroup_root) = fake_proc(78, Some("max\n"));
        let source = ProcSampleSource::new(
            78,
            proc_root.path(),
            cgroup_root.path(),
            Duration::from_secs(1),
        );

        let sample = tokio_test::assert_ok!(source.read_sample().await);
        assert_eq!(sample.limit, 16_000_000 * 1024);
    }

    #[tokio::test]
    async fn test_missing_process_is_an_error() {
        let (proc_root, cgroup_root) = fake_proc(79, None);
        let mut source = ProcSampleSource::new(
            80,
            proc_root.path(),
            cgroup_root.path(),
            Duration::from_millis(10),
        );
        assert!(source.next_sample().await.is_err());
        assert_eq!(source.describe(), "pid:80");
    }

    #[tokio::test]
    async fn test_cancelled_read_is_not_lost() {
        let (proc_root, cgroup_root) = fake_proc(81, None);
        let mut source = ProcSampleSource::new(
            81,
            proc_root.path(),
            cgroup_root.path(),
            Duration::from_secs(3600),
        );

        // Abandon calls until one has started a read
        while source.pending.is_none() {
            let mut call = tokio_test::task::spawn(source.next_sample());
            let _ = call.poll();
            drop(call);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // The next tick is an hour away, so only the abandoned read can answer
        let sample = tokio::time::timeout(Duration::from_secs(5), source.next_sample())
            .await
            .expect("abandoned read was dropped")
            .unwrap()
            .unwrap();
        assert_eq!(sample.used, 120_000 * 1024);
    }

    #[tokio::test]
    async fn test_push_source_sanitizes_and_stamps() {
        let (sender, mut source) = PushSampleSource::channel(4);
        sender
            .push(RawSample {
                used: Some(-5.0),
                total: Some(100.0),
                limit: Some(f64::NAN),
                ..Default::default()
            })
            .await
            .unwrap();

        let sample = source.next_sample().await.unwrap().unwrap();
        assert_eq!(sample.used, 0);
        assert_eq!(sample.total, 100);
        assert_eq!(sample.limit, 0);
        assert!(sample.timestamp > 0);

        drop(sender);
        assert!(source.next_sample().await.unwrap().is_none());
    }
}
