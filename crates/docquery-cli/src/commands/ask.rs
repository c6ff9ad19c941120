//! Ask command

use crate::app::{OutputFormat, QueryArgs};
use crate::output;
use anyhow::Result;
use docquery_core::{Config, Orchestrator};

pub async fn run(args: QueryArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let response = orchestrator.resolve_and_execute(&args.text()).await;
    print!("{}", output::format_chat_response(&response, format)?);
    Ok(())
}
