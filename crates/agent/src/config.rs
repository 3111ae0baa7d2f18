//! Agent configuration

use anyhow::Result;
use heapwatch_lib::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming an optional config file
pub const CONFIG_PATH_ENV: &str = "HEAPWATCH_CONFIG";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Port for health, metrics and the control API
    pub api_port: u16,

    /// Process to sample; samples are pushed over the API when unset
    pub target_pid: Option<u32>,

    pub proc_root: PathBuf,

    pub cgroup_root: PathBuf,

    pub engine: EngineConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_port: 9095,
            target_pid: None,
            proc_root: PathBuf::from("/proc"),
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            engine: EngineConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load from the optional file named by `HEAPWATCH_CONFIG`, then the
    /// environment (`HEAPWATCH_API_PORT`, `HEAPWATCH_ENGINE__WARNING_THRESHOLD`, ...)
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref(), true)
    }

    /// Load from an explicit file, optionally layering the environment on top
    pub fn load_from(file: Option<&Path>, with_env: bool) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        if with_env {
            builder = builder.add_source(
                config::Environment::with_prefix("HEAPWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config = builder.build()?;

        Ok(config
            .try_deserialize::<AgentConfig>()
            .map(|c| AgentConfig {
                engine: c.engine.normalized(),
                ..c
            })
            .unwrap_or_else(|e| {
                warn!(error = %e, "Invalid agent configuration, using defaults");
                AgentConfig::default()
            }))
    }

    /// Label used in logs for the sampled target
    pub fn source_label(&self) -> String {
        match self.target_pid {
            Some(pid) => format!("pid:{}", pid),
            None => "push".to_string(),
        }
    }
}
