//! CLI tool for inspecting transport endpoints.
//!
//! Provides commands for:
//! - Parsing and normalizing endpoint strings
//! - Encoding endpoint lists to the wire format and decoding them back
//! - Resolving endpoints into connectors
//! - Expanding adapter endpoints for publication

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
