//! Configuration-related CLI commands.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::analyze::load_config;
use crate::config::{config_source_label, resolve_context_dir, CONFIG_FILE_NAME};
use crate::data::to_yaml;
use crate::utils::check_git_repository;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows where the configuration comes from and its effective values.
    Show(ShowCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Path inside the repository.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Path to custom context directory (defaults to .git-deploy/).
    #[arg(long)]
    pub context_dir: Option<PathBuf>,
}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<ExitCode> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<ExitCode> {
        let repo = check_git_repository(&self.repo)?;
        let root = repo.workdir()?;
        let dir = resolve_context_dir(self.context_dir.as_deref(), &root);

        println!("# Context directory: {}", dir.display());
        println!("# {CONFIG_FILE_NAME}: {}", config_source_label(&dir, CONFIG_FILE_NAME));
        print!("{}", to_yaml(&load_config(&root, self.context_dir.as_deref()))?);
        Ok(ExitCode::SUCCESS)
    }
}
