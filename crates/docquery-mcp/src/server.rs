//! MCP server implementation

use crate::protocol::*;
use crate::tools;
use anyhow::Result;
use docquery_core::{Orchestrator, Tool};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

pub struct McpServer {
    orchestrator: Arc<Orchestrator>,
}

impl McpServer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn run(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = BufWriter::new(tokio::io::stdout());
        self.serve(reader, writer).await
    }

    /// Serve newline-delimited JSON-RPC until the reader is exhausted
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let response = JsonRpcResponse::error(
                        None,
                        error_codes::PARSE_ERROR,
                        format!("Parse error: {}", e),
                    );
                    self.write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            if request.is_notification() {
                tracing::debug!(method = %request.method, "Notification received");
                continue;
            }

            let response = self.handle_request(&request).await;
            self.write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    async fn write_response<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        if !request.has_valid_version() {
            return JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            );
        }
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => JsonRpcResponse::success(request.id.clone(), serde_json::json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => self.handle_resources_list(request),
            "prompts/list" => self.handle_prompts_list(request),
            _ => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": { "subscribe": false },
                "prompts": {}
            },
            "serverInfo": {
                "name": "docquery",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(request.id.clone(), result)
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let tools = tools::all_tool_definitions();
        JsonRpcResponse::success(request.id.clone(), serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let name = request
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        tracing::info!(tool = name, "Tool call");
        let orchestrator = self.orchestrator.as_ref();

        let result = match name {
            "chat" => tools::handle_chat(orchestrator, arguments).await,
            "get_document" => {
                tools::handle_document_tool(orchestrator, Tool::GetDocument, arguments).await
            }
            "list_documents" => {
                tools::handle_document_tool(orchestrator, Tool::ListDocuments, arguments).await
            }
            "search_documents" => {
                tools::handle_document_tool(orchestrator, Tool::SearchDocuments, arguments).await
            }
            _ => Err(anyhow::anyhow!("Unknown tool: {}", name)),
        };

        let tool_result = result.unwrap_or_else(|e| ToolResult::error(format!("Error: {}", e)));
        match serde_json::to_value(tool_result) {
            Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
            Err(e) => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INTERNAL_ERROR,
                format!("Internal error: {}", e),
            ),
        }
    }

    fn handle_resources_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(request.id.clone(), serde_json::json!({ "resources": [] }))
    }

    fn handle_prompts_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let prompts: Vec<Value> = vec![serde_json::json!({
            "name": "ask",
            "title": "DocQuery Question Guide",
            "description": "How to ask about customers, invoices, projects and reports"
        })];
        JsonRpcResponse::success(
            request.id.clone(),
            serde_json::json!({ "prompts": prompts }),
        )
    }
}

pub async fn start_server(orchestrator: Arc<Orchestrator>) -> Result<()> {
    tracing::info!(llm = orchestrator.has_llm(), "Starting MCP server on stdio");
    let server = McpServer::new(orchestrator);
    server.run().await
}
