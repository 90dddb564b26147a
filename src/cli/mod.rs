//! CLI interface for arb-sentinel
//!
//! Provides subcommands for:
//! - `replay`: Run recorded streams through the risk controls
//! - `config`: Show the effective configuration

mod replay;

pub use replay::{OutputFormat, ReplayArgs, ReplayReport};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "arb-sentinel")]
#[command(about = "Risk controls for synthetic arbitrage across correlated market pairs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay recorded streams through the risk controls
    Replay(ReplayArgs),
    /// Show configuration
    Config,
}
