//! Subcommands module for Ark CLI
//!
//! This module contains all the subcommand implementations.

pub mod config;
pub mod facts;
pub mod report;

use crate::cli::output::OutputFormatter;
use anyhow::{Context, Result};
use ark::config::Config;
use ark::facts::{Database, Session};
use tracing::info;

/// Common context shared between commands
pub struct CommandContext {
    /// Effective configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.output.color;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());

        Self { config, output }
    }

    /// Open a session on the configured fact store
    pub fn session(&self) -> Result<Session> {
        let url = self.config.database_url();
        let database =
            Database::open(&url).with_context(|| format!("Failed to open fact store '{}'", url))?;
        Ok(database.session()?)
    }

    /// Pager command when `page` was requested
    pub fn pager(&self, page: bool) -> Option<String> {
        (page && !self.output.is_json()).then(|| self.config.pager())
    }

    /// Record who ran which command
    pub fn log_invocation(&self, command: &str, params: &[(&str, String)]) {
        let params = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        info!("User '{}' ran '{}' with [{}]", current_user(), command, params);
    }
}

/// Login name of the invoking user
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
