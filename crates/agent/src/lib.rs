//! Heapwatch agent
//!
//! Samples one process (or accepts pushed samples), drives the memory engine
//! and serves health, metrics and the control API over HTTP.

pub mod api;
pub mod config;
pub mod runtime;
pub mod sampler;
pub mod state;

pub use config::AgentConfig;
pub use state::AppState;
