//! MAGI command line interface.

pub mod commands;
pub mod interactive;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// MAGI - ask several LLMs, get one answer.
#[derive(Parser, Debug)]
#[command(name = "magi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "magi.toml")]
    pub config: PathBuf,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default magi.toml.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Starts the MCP server on stdio.
    Serve,

    /// Shows provider configuration.
    Status {
        /// Send a probe prompt to each provider.
        #[arg(long)]
        ping: bool,

        /// Providers to probe (default: enabled providers).
        #[arg(short, long, value_delimiter = ',')]
        providers: Vec<String>,
    },

    /// Asks several providers and prints one answer.
    Consensus(QueryArgs),

    /// Asks several providers and prints every answer.
    Compare(QueryArgs),

    /// Edits the configuration interactively.
    Config,

    /// Diagnoses configuration problems.
    Doctor,

    /// Shows version.
    Version,
}

/// Arguments shared by `consensus` and `compare`.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Prompt text, or @path to read it from a file.
    pub prompt: String,

    /// System instruction.
    #[arg(short, long)]
    pub system: Option<String>,

    /// Providers to query, comma separated (default: enabled providers).
    #[arg(short, long, value_delimiter = ',')]
    pub providers: Vec<String>,

    /// Model override as provider=model; repeatable.
    #[arg(short, long = "model", value_name = "PROVIDER=MODEL")]
    pub models: Vec<String>,

    /// Sampling temperature.
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Per-provider timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output token cap.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Print the raw JSON response.
    #[arg(long)]
    pub json: bool,
}
