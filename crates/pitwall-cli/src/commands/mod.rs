//! CLI command handlers

pub mod config;
pub mod relay;
pub mod run;
pub mod status;
pub mod task;
