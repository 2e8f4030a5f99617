//! CLI type definitions
//!
//! This module contains the clap structure that defines the CLI interface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "swimbench")]
#[command(
    about = "Parameter-sweep benchmark orchestrator for SWIM gossip clusters",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Build configuration header rewritten before every rebuild
    #[arg(long, value_name = "PATH")]
    pub header: PathBuf,

    /// YAML file overriding the built-in campaign defaults
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
