//! Ark - fact store and run coordination for configuration management
//!
//! This is the main entry point for the Ark CLI.

mod cli;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use ark::config::Config;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// File name of the persistent log inside the log directory
const LOG_FILE: &str = "ark.log";

fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration, then apply command-line overrides
    let mut config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        Config::default()
    });
    if let Some(dir) = &cli.projects_dir {
        config = config.with_projects_dir(dir);
    }
    if let Some(url) = &cli.db_url {
        config = config.with_database_url(url);
    }

    // Initialize logging based on verbosity and configuration
    init_logging(cli.verbosity(), &config);

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("Ark v{} by {}", VERSION, AUTHORS);
    }

    let exit_code = match run(&cli, config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<ark::error::Error>()
                .map_or(1, ark::error::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

/// Execute the selected command
fn run(cli: &Cli, config: Config) -> Result<i32> {
    // Create command context
    let mut ctx = CommandContext::new(cli, config);

    match &cli.command {
        Commands::Facts(args) => args.execute(&mut ctx),
        Commands::Report(args) => args.execute(&mut ctx),
        Commands::Config => cli::commands::config::execute(&mut ctx),
    }
}

/// Translate a configured level name into a filter directive
fn level_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

/// Initialize logging: console on stderr, plus `<log_dir>/ark.log`
fn init_logging(verbosity: u8, config: &Config) {
    let console_level = match verbosity {
        0 => level_directive(&config.logging.console_level),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&console_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 3)
        .with_filter(console_filter);

    let file_layer = open_log_file(config).map(|file| {
        let file_filter = EnvFilter::try_new(level_directive(&config.logging.file_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_filter(file_filter)
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

/// Open the persistent log for appending, when a log directory is usable
fn open_log_file(config: &Config) -> Option<std::fs::File> {
    if config.logging.log_dir.is_none() && !config.projects_dir().is_dir() {
        return None;
    }

    let log_dir = config.log_dir();
    let opened = std::fs::create_dir_all(&log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(LOG_FILE))
    });
    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "Warning: File logging disabled, cannot open {}: {}",
                log_dir.join(LOG_FILE).display(),
                e
            );
            None
        }
    }
}
