//! CLI module for the UBO trace engine
//!
//! Provides command-line interface parsing and handling for the ubo-trace binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// UBO Trace - staged beneficial ownership evidence gathering
#[derive(Parser, Debug)]
#[command(
    name = "ubo-trace",
    version,
    about = "UBO Trace - staged beneficial ownership evidence gathering",
    long_about = "Runs four evidence stages (direct and indirect, all-time and recent) against\n\
                  research agents and search APIs, then reports whether a named individual is\n\
                  directly connected, only indirectly connected, or not connected to a company.",
    after_help = "EXAMPLES:\n    \
                  ubo-trace init                                  # Scaffold ubo.toml and .env.example\n    \
                  ubo-trace config --validate                     # Check configuration and env vars\n    \
                  ubo-trace trace -e \"Acme Ltd\" -u \"Jane Doe\" -l UK  # Run one trace\n    \
                  ubo-trace serve                                 # Start the HTTP API"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "ubo.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Run a single four-stage trace and print the verdict
    Trace {
        /// Company to trace
        #[arg(short, long)]
        entity: String,

        /// Individual suspected to be the beneficial owner
        #[arg(short, long)]
        ubo: String,

        /// Jurisdiction or location of the company
        #[arg(short, long)]
        location: String,

        /// Known company domain (inferred from the entity name when omitted)
        #[arg(short, long)]
        domain: Option<String>,

        /// Print the full trace summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scaffold ubo.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Show the loaded configuration
    Config {
        /// Only validate, reporting errors and warnings
        #[arg(long)]
        validate: bool,
    },
}
