//! CLI definition and command handling

pub mod commands;
pub mod output;
pub mod params;

use clap::{Parser, Subcommand};

use commands::{ListProjectsCommand, PlanCommand, RunCommand};

/// Slipway - release orchestration for containerized application groups
#[derive(Debug, Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a target and its dependencies
    Run(RunCommand),

    /// Show the execution plan of a target without running it
    Plan(PlanCommand),

    /// List the discovered application, test and package projects
    ListProjects(ListProjectsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::Plan(ref cmd) => cmd.execute(&self),
            Commands::ListProjects(ref cmd) => cmd.execute(&self),
        }
    }
}
