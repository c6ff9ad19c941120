//! Integration tests for the MCP server against an in-memory store

use async_trait::async_trait;
use docquery_core::store::{AggregateRequest, ListRequest, ReportOutput, ReportRequest};
use docquery_core::{DocQueryError, Document, DocumentStore, Orchestrator, Result, RoutingTables};
use docquery_mcp::protocol::JsonRpcRequest;
use docquery_mcp::McpServer;
use serde_json::{json, Value};
use std::sync::Arc;

struct ProjectStore;

fn project() -> Document {
    json!({"name": "PROJ-0001", "project_name": "Website Redesign", "status": "Open"})
        .as_object()
        .cloned()
        .unwrap()
}

#[async_trait]
impl DocumentStore for ProjectStore {
    async fn get(&self, doctype: &str, name: &str) -> Result<Document> {
        if doctype == "Project" && name == "PROJ-0001" {
            Ok(project())
        } else {
            Err(DocQueryError::Store(format!("HTTP 404: {} {} not found", doctype, name)))
        }
    }

    async fn list(&self, request: &ListRequest) -> Result<Vec<Document>> {
        Ok(if request.doctype == "Project" { vec![project()] } else { Vec::new() })
    }

    async fn search(&self, _doctype: &str, _query: &str, _page_size: usize) -> Result<Vec<Document>> {
        Ok(vec![project()])
    }

    async fn create(&self, _doctype: &str, _data: &Document) -> Result<Document> {
        Err(DocQueryError::Store("read-only".to_string()))
    }

    async fn update(&self, _doctype: &str, _name: &str, _data: &Document) -> Result<Document> {
        Err(DocQueryError::Store("read-only".to_string()))
    }

    async fn delete(&self, _doctype: &str, _name: &str) -> Result<()> {
        Err(DocQueryError::Store("read-only".to_string()))
    }

    async fn aggregate(&self, _request: &AggregateRequest) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn run_report(&self, _request: &ReportRequest) -> Result<ReportOutput> {
        Ok(ReportOutput::default())
    }
}

fn server() -> McpServer {
    let orchestrator = Orchestrator::new(
        Arc::new(ProjectStore),
        None,
        Arc::new(RoutingTables::default()),
    );
    McpServer::new(Arc::new(orchestrator))
}

fn request(value: Value) -> JsonRpcRequest {
    serde_json::from_value(value).unwrap()
}

async fn call(server: &McpServer, value: Value) -> Value {
    let response = server.handle_request(&request(value)).await;
    serde_json::to_value(response).unwrap()
}

#[tokio::test]
async fn test_initialize() {
    let response = call(
        &server(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
    )
    .await;

    assert_eq!(response["result"]["serverInfo"]["name"], "docquery");
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
}

#[tokio::test]
async fn test_tools_list() {
    let response = call(
        &server(),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    )
    .await;

    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["chat", "get_document", "list_documents", "search_documents"]);
}

#[tokio::test]
async fn test_chat_tool_runs_pipeline() {
    let response = call(
        &server(),
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "chat", "arguments": {"query": "list all projects"}}
        }),
    )
    .await;

    let result = &response["result"];
    assert!(result.get("isError").is_none());
    assert!(result["content"][0]["text"].as_str().unwrap().contains("PROJ-0001"));
    assert_eq!(result["structuredContent"]["tools_called"], json!(["list_documents"]));
}

#[tokio::test]
async fn test_get_document_tool() {
    let response = call(
        &server(),
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "get_document", "arguments": {"doctype": "Project", "name": "PROJ-0001"}}
        }),
    )
    .await;

    assert_eq!(response["result"]["structuredContent"]["status"], "Open");
}

#[tokio::test]
async fn test_tool_errors_are_results() {
    let response = call(
        &server(),
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "get_document", "arguments": {"doctype": "Project"}}
        }),
    )
    .await;

    assert_eq!(response["result"]["isError"], true);
    assert!(response["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("name is required"));
}

#[tokio::test]
async fn test_unknown_method() {
    let response = call(
        &server(),
        json!({"jsonrpc": "2.0", "id": 6, "method": "sampling/createMessage"}),
    )
    .await;

    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version_rejected() {
    let response = call(
        &server(),
        json!({"jsonrpc": "1.0", "id": 8, "method": "ping"}),
    )
    .await;

    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 8);
}

#[tokio::test]
async fn test_serve_skips_notifications_and_reports_parse_errors() {
    let input = concat!(
        r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#,
        "\n",
        "not json\n",
        r#"{"jsonrpc": "2.0", "id": 7, "method": "ping"}"#,
        "\n",
    );
    let mut output = Vec::new();

    server().serve(input.as_bytes(), &mut output).await.unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["error"]["code"], -32700);
    assert_eq!(lines[1]["id"], 7);
}
