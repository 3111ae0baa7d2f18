//! Core data models for the telemetry engine

use serde::{Deserialize, Serialize};

/// One timestamped memory measurement
///
/// Memory fields are bytes. `timestamp` is the host sample clock in milliseconds.
/// `used <= total <= limit` is expected but never enforced; a `limit` of 0
/// means the limit is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Host sample clock, in ms
    pub timestamp: u64,
    /// Bytes in use
    pub used: u64,
    /// Bytes reserved by the heap
    pub total: u64,
    /// Maximum the heap may grow to
    pub limit: u64,
    /// DOM node count, when the host reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_nodes: Option<u64>,
    /// Event listener count, when the host reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listeners: Option<u64>,
}

impl Sample {
    /// Sample without the optional DOM counters
    pub fn new(timestamp: u64, used: u64, total: u64, limit: u64) -> Self {
        Self {
            timestamp,
            used,
            total,
            limit,
            dom_nodes: None,
            listeners: None,
        }
    }

    pub fn with_dom_nodes(mut self, dom_nodes: u64) -> Self {
        self.dom_nodes = Some(dom_nodes);
        self
    }

    pub fn with_listeners(mut self, listeners: u64) -> Self {
        self.listeners = Some(listeners);
        self
    }

    /// Usage as a fraction of the limit, `None` when the limit is unknown
    pub fn usage_ratio(&self) -> Option<f64> {
        if self.limit == 0 {
            return None;
        }
        Some(self.used as f64 / self.limit as f64)
    }

    /// Usage as a percentage of the limit (0 when the limit is unknown)
    pub fn usage_percentage(&self) -> f64 {
        self.usage_ratio().map(|r| r * 100.0).unwrap_or(0.0)
    }
}

/// Untrusted sample as received from a host (e.g. pushed over HTTP)
///
/// Every reading may be missing, negative or NaN. A zero timestamp means the
/// receiver should stamp the sample on arrival.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub used: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub dom_nodes: Option<f64>,
    #[serde(default)]
    pub listeners: Option<f64>,
}

impl RawSample {
    /// Convert into a [`Sample`], clamping invalid readings instead of failing
    pub fn sanitize(&self) -> Sample {
        Sample {
            timestamp: self.timestamp,
            used: clamp_bytes(self.used).unwrap_or(0),
            total: clamp_bytes(self.total).unwrap_or(0),
            limit: clamp_bytes(self.limit).unwrap_or(0),
            dom_nodes: clamp_bytes(self.dom_nodes),
            listeners: clamp_bytes(self.listeners),
        }
    }
}

/// NaN and infinities become `None`, negatives clamp to 0
fn clamp_bytes(value: Option<f64>) -> Option<u64> {
    let v = value?;
    if !v.is_finite() {
        return None;
    }
    if v <= 0.0 {
        return Some(0);
    }
    Some(v.round() as u64)
}

/// Direction of a memory series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Slope above the noise floor
    Increasing,
    /// Slope within the noise floor, or too few samples
    Stable,
    /// Slope below the negative noise floor
    Decreasing,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Increasing => write!(f, "increasing"),
            Trend::Stable => write!(f, "stable"),
            Trend::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// Coarse classification of usage against the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Below the warning threshold, or the limit is unknown
    Normal,
    /// At or above the warning threshold
    Warning,
    /// At or above the critical threshold
    Critical,
}

impl Severity {
    /// Numeric level for gauges (0, 1, 2)
    pub fn level(&self) -> i64 {
        match self {
            Severity::Normal => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "normal"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}
