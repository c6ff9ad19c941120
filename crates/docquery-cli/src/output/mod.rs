//! Output formatters

use crate::app::OutputFormat;
use anyhow::Result;
use docquery_core::{ChatResponse, Classified};
use std::fmt::Write;

pub fn format_chat_response(response: &ChatResponse, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(response)? + "\n");
    }

    let tools = if response.tools_called.is_empty() {
        "none".to_string()
    } else {
        response.tools_called.join(", ")
    };
    Ok(format!(
        "{}\n\n[tools: {} | quality: {}]\n",
        response.response.trim_end(),
        tools,
        response.data_quality
    ))
}

pub fn format_classified(classified: &Classified, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(classified)? + "\n");
    }

    let intent = &classified.intent;
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let tool = intent
        .tool
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut out = String::new();
    writeln!(out, "Action:          {}", intent.action)?;
    writeln!(out, "Doctype:         {}", or_dash(&intent.doctype))?;
    writeln!(out, "Entity:          {}", or_dash(&intent.entity_name))?;
    writeln!(out, "Tool:            {}", tool)?;
    writeln!(out, "Requires search: {}", intent.requires_search)?;
    writeln!(out, "Backend related: {}", intent.is_backend_related)?;
    writeln!(out, "Confidence:      {:.2}", intent.confidence)?;
    writeln!(out, "Source:          {:?}", intent.source)?;
    if classified.llm_rate_limited {
        writeln!(out, "Note:            LLM rate limited, fallback routing used")?;
    }
    Ok(out)
}
