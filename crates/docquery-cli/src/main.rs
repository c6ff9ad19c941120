//! DocQuery CLI
//!
//! Natural-language questions against an ERPNext/Frappe backend.

use anyhow::Result;
use clap::Parser;
use docquery_core::error::exit_codes;
use docquery_core::{Config, DocQueryError};

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries answers and the MCP protocol
    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<DocQueryError>()
            .map(DocQueryError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Ask(args) => commands::ask::run(args, &config, cli.format).await,
        Commands::Classify(args) => commands::classify::run(args, &config, cli.format).await,
        Commands::Config => commands::config::run(&config, cli.format),
        Commands::Mcp => commands::mcp::run(&config).await,
    }
}
