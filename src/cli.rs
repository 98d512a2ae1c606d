//! CLI argument parsing for Benchkeeper

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for a one-shot run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain-text report (default)
    Text,
    /// HTML tables
    Html,
    /// JSON payload with locators and both renderings
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "benchkeeper")]
#[command(version)]
#[command(about = "Benchmark regression tracking with baseline snapshots", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Path to the TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark pipeline once for a repository
    Run {
        /// Repository reference, e.g. github.com/acme/widgets
        #[arg(long = "repo", value_name = "REF")]
        repo: String,

        /// Store snapshots publicly readable
        #[arg(long = "public")]
        public: bool,

        /// Comma-separated recipients to notify on change
        #[arg(long = "notify", value_name = "EMAILS", value_delimiter = ',')]
        notify: Vec<String>,

        /// Output format
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Serve the HTTP API
    Serve {
        /// Listen port (overrides the config file)
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
}
