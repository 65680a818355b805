//! Binary entry point for instruct.
//!
//! This binary provides the CLI interface for running instructions against
//! selected text.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use instruct::cli::{self, DocumentArgs, OutputFormat};
use instruct::config::InstructConfig;
use instruct::observability::{self, InitOptions};
use std::path::Path;
use std::process::ExitCode;

/// Instruct - run reusable instructions against selected text.
#[derive(Parser)]
#[command(name = "instruct")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "INSTRUCT_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Apply an instruction to the selection.
    Run {
        /// The instruction text.
        #[arg(short, long)]
        instruction: String,

        /// Send each selected line as its own request.
        #[arg(short, long)]
        multiple: bool,

        #[command(flatten)]
        document: DocumentArgs,
    },

    /// Suggest instructions from history, or run one of them.
    Find {
        /// Text the instruction must contain (case-insensitive).
        query: Option<String>,

        /// Run the N-th suggestion (1-based).
        #[arg(short, long)]
        pick: Option<usize>,

        /// Send each selected line as its own request.
        #[arg(short, long)]
        multiple: bool,

        #[command(flatten)]
        document: DocumentArgs,
    },

    /// List the instruction history, most used first.
    List {
        /// Maximum number of results.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format: table or json.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_config(
        &config.logging,
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &InstructConfig) -> instruct::Result<()> {
    match command {
        Commands::Run {
            instruction,
            multiple,
            document,
        } => cli::cmd_run(config, &instruction, multiple, &document),

        Commands::Find {
            query,
            pick,
            multiple,
            document,
        } => cli::cmd_find(config, query.as_deref(), pick, multiple, &document),

        Commands::List { limit, format } => cli::cmd_list(config, limit, format),

        Commands::Config { show } => cli::cmd_config(config, show),
    }
}

/// Loads configuration from `path`, or the default location, then applies
/// environment overrides.
fn load_config(path: Option<&str>) -> instruct::Result<InstructConfig> {
    let config = match path.filter(|p| !p.trim().is_empty()) {
        Some(config_path) => InstructConfig::load_from_file(Path::new(config_path))?,
        None => InstructConfig::load_default()?,
    };
    config.with_env_overrides()
}
