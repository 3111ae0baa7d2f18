pub mod config;
pub mod snapshots;
pub mod status;
