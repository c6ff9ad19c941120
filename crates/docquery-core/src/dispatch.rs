//! Tool dispatch: one tool call, one document store call

use crate::error::{DocQueryError, Result};
use crate::intent::Tool;
use crate::store::{AggregateRequest, Document, DocumentStore, ListRequest, ReportRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const DASHBOARD_PAGE_SIZE: usize = 50;
const DASHBOARD_FIELDS: &[&str] = &["name", "project_name", "status", "percent_complete", "priority"];

/// A tool name plus its JSON parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: Tool,
    pub params: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: Tool, params: Map<String, Value>) -> Self {
        Self { tool, params }
    }

    /// Parameters for a tool aimed at one resolved document.
    ///
    /// Generic tools take `{doctype, name}`; legacy project tools take
    /// `project_name` only.
    pub fn with_entity(tool: Tool, doctype: &str, name: &str) -> Self {
        let params = match tool {
            Tool::GetProjectStatus | Tool::AnalyzeProjectTimeline => json!({ "project_name": name }),
            Tool::GetDocument | Tool::AnalyzeDocument => json!({
                "doctype": doctype,
                "name": name,
                "include_related": true,
            }),
            Tool::SearchDocuments => json!({ "doctype": doctype, "query": name }),
            _ => json!({ "doctype": doctype, "name": name }),
        };
        Self::new(tool, into_map(params))
    }
}

/// Raw result of a dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool: Tool,
    /// One-line description of what was fetched
    pub summary: String,
    pub payload: Value,
}

/// Maps tool calls onto the document store
pub struct ToolDispatcher {
    store: Arc<dyn DocumentStore>,
    default_page_size: usize,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, default_page_size: usize) -> Self {
        Self {
            store,
            default_page_size,
        }
    }

    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput> {
        tracing::info!(tool = %call.tool, params = %serde_json::Value::Object(call.params.clone()), "Executing tool");
        let p = &call.params;

        let (summary, payload) = match call.tool {
            Tool::GetDocument => {
                let (doctype, name) = (required(p, "doctype")?, required(p, "name")?);
                let doc = self.store.get(doctype, name).await?;
                (format!("Document: {} {}", doctype, name), Value::Object(doc))
            }
            Tool::ListDocuments => {
                let request = ListRequest {
                    doctype: required(p, "doctype")?.to_string(),
                    filters: object(p, "filters"),
                    fields: strings(p, "fields"),
                    limit: Some(self.page_size(p)),
                };
                let docs = self.store.list(&request).await?;
                let count = docs.len();
                (
                    format!("Found {} {} documents", count, request.doctype),
                    json!({ "data": docs, "total_count": count }),
                )
            }
            Tool::SearchDocuments => {
                let doctype = required(p, "doctype")?;
                let query = ["query", "search", "name"]
                    .iter()
                    .find_map(|key| p.get(*key).and_then(Value::as_str))
                    .unwrap_or_default();
                let hits = self.store.search(doctype, query, self.page_size(p)).await?;
                (
                    format!("Search results for {} '{}'", doctype, query),
                    json!({ "data": hits }),
                )
            }
            Tool::CreateDocument => {
                let doctype = required(p, "doctype")?;
                let doc = self.store.create(doctype, &data(p)?).await?;
                (format!("Created {} document", doctype), Value::Object(doc))
            }
            Tool::UpdateDocument => {
                let (doctype, name) = (required(p, "doctype")?, required(p, "name")?);
                let doc = self.store.update(doctype, name, &data(p)?).await?;
                (format!("Updated {} {}", doctype, name), Value::Object(doc))
            }
            Tool::DeleteDocument => {
                let (doctype, name) = (required(p, "doctype")?, required(p, "name")?);
                self.store.delete(doctype, name).await?;
                (
                    format!("Deleted {} {}", doctype, name),
                    json!({ "doctype": doctype, "name": name, "deleted": true }),
                )
            }
            Tool::AnalyzeDocument => {
                let (doctype, name) = (required(p, "doctype")?, required(p, "name")?);
                let include_related = p
                    .get("include_related")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let doc = self.store.get(doctype, name).await?;
                let mut analysis = json!({ "doctype": doctype, "name": name });
                if include_related {
                    let related = related_child_tables(&doc);
                    if !related.is_empty() {
                        analysis["related_documents"] = Value::Object(related);
                    }
                }
                analysis["document"] = Value::Object(doc);
                (format!("Document Analysis for {}: {}", doctype, name), analysis)
            }
            Tool::AggregateDocuments => {
                let request: AggregateRequest = parse_params(p)?;
                if request.doctype.is_empty() {
                    return Err(DocQueryError::InvalidInput("doctype is required".to_string()));
                }
                let rows = self.store.aggregate(&request).await?;
                (
                    format!("Aggregation over {} ({} rows)", request.doctype, rows.len()),
                    json!({ "data": rows }),
                )
            }
            Tool::RunReport => {
                let request: ReportRequest = parse_params(p)?;
                if request.report_name.is_empty() {
                    return Err(DocQueryError::InvalidInput("report_name is required".to_string()));
                }
                let report = self.store.run_report(&request).await?;
                (
                    format!("Report: {}", request.report_name),
                    json!({
                        "report_name": request.report_name,
                        "columns": report.columns,
                        "data": report.data,
                    }),
                )
            }
            Tool::PortfolioDashboard => {
                let request = ListRequest {
                    doctype: "Project".to_string(),
                    filters: Map::new(),
                    fields: DASHBOARD_FIELDS.iter().map(|f| f.to_string()).collect(),
                    limit: Some(DASHBOARD_PAGE_SIZE),
                };
                let projects = self.store.list(&request).await?;
                let overview = json!({
                    "total_projects": projects.len(),
                    "open_projects": count_status(&projects, "Open"),
                    "completed_projects": count_status(&projects, "Completed"),
                });
                (
                    "Portfolio Dashboard".to_string(),
                    json!({ "data": projects, "portfolio_overview": overview }),
                )
            }
            Tool::GetProjectStatus => {
                let name = required(p, "project_name")?;
                let project = self.store.get("Project", name).await?;
                let summary = json!({
                    "project_name": name,
                    "status": project.get("status"),
                    "percent_complete": project.get("percent_complete"),
                    "last_updated": project.get("modified"),
                });
                (
                    format!("Project Status for: {}", name),
                    json!({ "project": project, "summary": summary }),
                )
            }
            Tool::AnalyzeProjectTimeline => {
                let name = required(p, "project_name")?;
                let project = self.store.get("Project", name).await?;
                let tasks = project.get("tasks").cloned().unwrap_or_else(|| json!([]));
                let timeline = json!({
                    "total_tasks": tasks.as_array().map(Vec::len).unwrap_or(0),
                    "project_start_date": project.get("expected_start_date"),
                    "project_end_date": project.get("expected_end_date"),
                    "project_progress": project.get("percent_complete"),
                });
                (
                    format!("Timeline Analysis for Project: {}", name),
                    json!({ "project": project, "timeline_analysis": timeline, "tasks": tasks }),
                )
            }
        };

        Ok(ToolOutput {
            tool: call.tool,
            summary,
            payload,
        })
    }

    fn page_size(&self, params: &Map<String, Value>) -> usize {
        ["limit", "page_size"]
            .iter()
            .find_map(|key| params.get(*key).and_then(Value::as_u64))
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(self.default_page_size)
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn required<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DocQueryError::InvalidInput(format!("{} is required", key)))
}

fn object(params: &Map<String, Value>, key: &str) -> Map<String, Value> {
    params
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn strings(params: &Map<String, Value>, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn data(params: &Map<String, Value>) -> Result<Document> {
    params
        .get("data")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| DocQueryError::InvalidInput("data is required".to_string()))
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| DocQueryError::InvalidInput(format!("invalid parameters: {}", e)))
}

/// Child tables already embedded in the document (no extra store calls)
fn related_child_tables(doc: &Document) -> Map<String, Value> {
    ["items", "tasks"]
        .iter()
        .filter_map(|key| {
            doc.get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

fn count_status(projects: &[Document], status: &str) -> usize {
    projects
        .iter()
        .filter(|p| p.get("status").and_then(Value::as_str) == Some(status))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_entity_generic_shape() {
        let call = ToolCall::with_entity(Tool::AnalyzeDocument, "Project", "PROJ-0001");
        assert_eq!(call.params["doctype"], "Project");
        assert_eq!(call.params["name"], "PROJ-0001");
        assert_eq!(call.params["include_related"], true);
    }

    #[test]
    fn test_with_entity_legacy_shape() {
        let call = ToolCall::with_entity(Tool::GetProjectStatus, "Project", "PROJ-0001");
        assert_eq!(call.params.len(), 1);
        assert_eq!(call.params["project_name"], "PROJ-0001");
    }

    #[test]
    fn test_required_rejects_blank() {
        let params = into_map(json!({"doctype": "  "}));
        assert!(required(&params, "doctype").is_err());
        assert!(required(&params, "name").is_err());
    }

    #[test]
    fn test_related_child_tables() {
        let doc = into_map(json!({"name": "SO-0001", "items": [{"item_code": "A"}], "tasks": null}));
        let related = related_child_tables(&doc);
        assert_eq!(related.len(), 1);
        assert!(related.contains_key("items"));
    }
}
