//! MCP command

use anyhow::Result;
use docquery_core::{Config, Orchestrator};
use std::sync::Arc;

pub async fn run(config: &Config) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(config)?);
    docquery_mcp::start_server(orchestrator).await
}
