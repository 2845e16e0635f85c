//! CLI interface for git-deploy.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod analyze;
pub mod config;
pub mod output;
pub mod ship;

/// git-deploy: change analysis, secret screening and deployment commits.
#[derive(Parser)]
#[command(name = "git-deploy")]
#[command(
    about = "Analyzes pending changes, screens them for secrets and creates deployment commits",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Analyzes the working tree and prints the report.
    Analyze(analyze::AnalyzeCommand),
    /// Analyzes, writes the deployment log and changelog, and commits.
    Ship(ship::ShipCommand),
    /// Configuration information.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command and returns the process exit code.
    pub fn execute(self) -> Result<ExitCode> {
        match self.command {
            Commands::Analyze(analyze_cmd) => analyze_cmd.execute(),
            Commands::Ship(ship_cmd) => ship_cmd.execute(),
            Commands::Config(config_cmd) => config_cmd.execute(),
        }
    }
}
