//! Binary entry point for cortex.
//!
//! This binary provides the CLI interface for the cortex memory store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{CategoryAction, MemoryAction, Session, StoreAction};
use cortex::observability::{self, LoggingConfig};
use cortex::{CortexConfig, Error};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

/// Cortex - A hierarchical, file-backed memory store for AI agents.
#[derive(Parser)]
#[command(name = "cortex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store to operate on (default from configuration).
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage memories.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Manage categories.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Rebuild every index of the store from its memory files.
    Reindex,

    /// Manage registered stores.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match CortexConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config).and_then(|output| render(&output)) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            let payload = e.to_payload();
            match serde_json::to_string_pretty(&payload) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("Error: {e}"),
            }
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &CortexConfig) -> Result<Value, Error> {
    match cli.command {
        Commands::Memory { action } => {
            let session = Session::open(config, cli.store.as_deref())?;
            commands::cmd_memory(action, &session)
        },

        Commands::Category { action } => {
            let session = Session::open(config, cli.store.as_deref())?;
            commands::cmd_category(action, &session)
        },

        Commands::Reindex => {
            let session = Session::open(config, cli.store.as_deref())?;
            commands::cmd_reindex(&session)
        },

        Commands::Store { action } => commands::cmd_store(action, config),
    }
}

fn render(output: &Value) -> Result<String, Error> {
    serde_json::to_string_pretty(output).map_err(|e| Error::OperationFailed {
        operation: "encode_output".to_string(),
        cause: e.to_string(),
    })
}
