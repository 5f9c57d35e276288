//! CLI module for Ark
//!
//! This module provides the command-line interface for Ark,
//! including argument parsing and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ark - fact store and run coordination for configuration management
#[derive(Parser, Debug, Clone)]
#[command(name = "ark")]
#[command(author = "Ark Contributors")]
#[command(version)]
#[command(about = "Collect, store and query per-host facts from playbook runs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "ARK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Projects root directory (overrides config and ARK_PROJECTS_DIR)
    #[arg(long, global = true)]
    pub projects_dir: Option<PathBuf>,

    /// Fact store URL (overrides config and ARK_DB_URL)
    #[arg(long, global = true)]
    pub db_url: Option<String>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Collect, query and manage stored host facts
    Facts(commands::facts::FactsArgs),

    /// Show play recaps from a project's recent runs
    Report(commands::report::ReportArgs),

    /// Print the effective configuration
    Config,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
