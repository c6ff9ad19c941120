//! MCP tool definitions and handlers

use crate::protocol::*;
use anyhow::Result;
use docquery_core::{Orchestrator, Tool, ToolCall};
use serde_json::{Map, Value};

pub fn chat_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "chat".to_string(),
        description: "Ask a natural-language question about your ERPNext data \
                      (customers, invoices, projects, items, reports)"
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question, e.g. \"top 5 customers by revenue\""
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn get_document_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: Tool::GetDocument.to_string(),
        description: "Fetch one document by doctype and name".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "doctype": {
                    "type": "string",
                    "description": "Document type (e.g. Customer, Project)"
                },
                "name": {
                    "type": "string",
                    "description": "Document name / ID (e.g. PROJ-0001)"
                }
            },
            "required": ["doctype", "name"]
        }),
    }
}

pub fn list_documents_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: Tool::ListDocuments.to_string(),
        description: "List documents of a doctype with optional filters".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "doctype": {
                    "type": "string",
                    "description": "Document type"
                },
                "filters": {
                    "type": "object",
                    "description": "Field filters, e.g. {\"status\": \"Open\"}"
                },
                "fields": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Fields to return"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default: 20)",
                    "default": 20
                }
            },
            "required": ["doctype"]
        }),
    }
}

pub fn search_documents_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: Tool::SearchDocuments.to_string(),
        description: "Search documents of a doctype by free text".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "doctype": {
                    "type": "string",
                    "description": "Document type"
                },
                "query": {
                    "type": "string",
                    "description": "Search text"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (default: 20)",
                    "default": 20
                }
            },
            "required": ["doctype", "query"]
        }),
    }
}

pub fn all_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        chat_tool_definition(),
        get_document_tool_definition(),
        list_documents_tool_definition(),
        search_documents_tool_definition(),
    ]
}

pub async fn handle_chat(orchestrator: &Orchestrator, args: Value) -> Result<ToolResult> {
    let query = args
        .get("query")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing query"))?;

    let response = orchestrator.resolve_and_execute(query).await;
    let is_error = response.error.is_some();
    let structured = serde_json::to_value(&response)?;

    let mut result = ToolResult::text(response.response, Some(structured));
    if is_error {
        result.is_error = Some(true);
    }
    Ok(result)
}

/// Run one of the direct document tools, bypassing classification
pub async fn handle_document_tool(
    orchestrator: &Orchestrator,
    tool: Tool,
    args: Value,
) -> Result<ToolResult> {
    let params = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => anyhow::bail!("Arguments must be an object, got {}", other),
    };

    let output = orchestrator.dispatch(&ToolCall::new(tool, params)).await?;
    let pretty = serde_json::to_string_pretty(&output.payload)?;

    Ok(ToolResult::text(
        format!("{}\n\n{}", output.summary, pretty),
        Some(output.payload),
    ))
}
