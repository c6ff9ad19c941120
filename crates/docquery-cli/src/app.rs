//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docquery")]
#[command(
    author,
    version,
    about = "Ask natural-language questions about your ERPNext data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (default: $DOCQUERY_CONFIG or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a question end to end
    Ask(QueryArgs),

    /// Show how a question would be routed, without touching the backend
    Classify(QueryArgs),

    /// Print the effective configuration
    Config,

    /// Start MCP server
    Mcp,
}

#[derive(Args)]
pub struct QueryArgs {
    /// The question
    #[arg(required = true)]
    pub query: Vec<String>,
}

impl QueryArgs {
    pub fn text(&self) -> String {
        self.query.join(" ")
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
