//! CLI subcommands

pub mod config;
pub mod refresh;
pub mod status;
pub mod top;
pub mod usage;
