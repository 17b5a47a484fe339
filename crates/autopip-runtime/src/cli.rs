//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "autopip", about = "Automatic picture-in-picture for background video tabs")]
pub struct Cli {
    /// TOML config file (timings and site profiles)
    #[arg(long, short = 'c', global = true, env = "AUTOPIP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay JSON scenarios against the in-memory host and print reports
    Replay(ReplayOpts),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Scenario files or directories of *.json scenarios
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Exit non-zero when a scenario misses its expectation
    #[arg(long)]
    pub check: bool,
}
