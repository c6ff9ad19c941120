//! Config command

use crate::app::OutputFormat;
use anyhow::Result;
use docquery_core::Config;

const MASK: &str = "********";

pub fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let mut shown = config.clone();
    let mut secrets = vec![
        &mut shown.llm.api_key,
        &mut shown.store.api_key,
        &mut shown.store.api_secret,
    ];
    if let Some(fallback) = shown.llm.fallback.as_deref_mut() {
        secrets.push(&mut fallback.api_key);
    }
    for secret in secrets {
        if secret.is_some() {
            *secret = Some(MASK.to_string());
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        OutputFormat::Text => print!("{}", serde_yaml::to_string(&shown)?),
    }
    Ok(())
}
