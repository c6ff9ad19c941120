//! In-memory collaborators for pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use docquery_core::store::{AggregateRequest, ListRequest, ReportOutput, ReportRequest};
use docquery_core::{
    ChatMessage, DocQueryError, Document, DocumentStore, LLMClient, Orchestrator, Result,
    RoutingTables,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("document must be a JSON object")
}

/// Store that answers from fixtures and records every call
#[derive(Default)]
pub struct FakeStore {
    pub documents: Vec<(String, Document)>,
    pub search_hits: Vec<Document>,
    pub aggregate_rows: Vec<Document>,
    pub report: ReportOutput,
    pub failure: Option<String>,
    calls: Mutex<Vec<String>>,
    aggregates: Mutex<Vec<AggregateRequest>>,
    reports: Mutex<Vec<ReportRequest>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, doctype: &str, document: Value) -> Self {
        self.documents.push((doctype.to_string(), doc(document)));
        self
    }

    pub fn with_search_hit(mut self, hit: Value) -> Self {
        self.search_hits.push(doc(hit));
        self
    }

    pub fn with_aggregate_row(mut self, row: Value) -> Self {
        self.aggregate_rows.push(doc(row));
        self
    }

    pub fn with_report(mut self, columns: Value, data: Value) -> Self {
        self.report = ReportOutput {
            columns: columns.as_array().cloned().unwrap_or_default(),
            data: data.as_array().cloned().unwrap_or_default(),
        };
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn aggregate_requests(&self) -> Vec<AggregateRequest> {
        self.aggregates.lock().unwrap().clone()
    }

    pub fn report_requests(&self) -> Vec<ReportRequest> {
        self.reports.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match &self.failure {
            Some(message) => Err(DocQueryError::Store(message.clone())),
            None => Ok(()),
        }
    }

    fn of_doctype(&self, doctype: &str) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|(dt, _)| dt == doctype)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn get(&self, doctype: &str, name: &str) -> Result<Document> {
        self.record(format!("get:{}:{}", doctype, name))?;
        self.of_doctype(doctype)
            .into_iter()
            .find(|d| d.get("name").and_then(Value::as_str) == Some(name))
            .ok_or_else(|| DocQueryError::Store(format!("HTTP 404: {} {} not found", doctype, name)))
    }

    async fn list(&self, request: &ListRequest) -> Result<Vec<Document>> {
        self.record(format!("list:{}", request.doctype))?;
        let mut docs = self.of_doctype(&request.doctype);
        if let Some(limit) = request.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn search(&self, doctype: &str, query: &str, page_size: usize) -> Result<Vec<Document>> {
        self.record(format!("search:{}:{}", doctype, query))?;
        Ok(self.search_hits.iter().take(page_size).cloned().collect())
    }

    async fn create(&self, doctype: &str, data: &Document) -> Result<Document> {
        self.record(format!("create:{}", doctype))?;
        let mut created = data.clone();
        created.insert("name".to_string(), json!(format!("{}-NEW", doctype.to_uppercase())));
        Ok(created)
    }

    async fn update(&self, doctype: &str, name: &str, data: &Document) -> Result<Document> {
        self.record(format!("update:{}:{}", doctype, name))?;
        let mut updated = data.clone();
        updated.insert("name".to_string(), json!(name));
        Ok(updated)
    }

    async fn delete(&self, doctype: &str, name: &str) -> Result<()> {
        self.record(format!("delete:{}:{}", doctype, name))
    }

    async fn aggregate(&self, request: &AggregateRequest) -> Result<Vec<Document>> {
        self.record(format!("aggregate:{}", request.doctype))?;
        self.aggregates.lock().unwrap().push(request.clone());
        Ok(self.aggregate_rows.clone())
    }

    async fn run_report(&self, request: &ReportRequest) -> Result<ReportOutput> {
        self.record(format!("report:{}", request.report_name))?;
        self.reports.lock().unwrap().push(request.clone());
        Ok(self.report.clone())
    }
}

/// LLM that replays a fixed script; `Err` entries become provider errors
pub struct ScriptedLlm {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|step| step.map(String::from).map_err(String::from))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) if message.contains("429") => Err(DocQueryError::RateLimited(message)),
            Some(Err(message)) => Err(DocQueryError::Llm(message)),
            None => Err(DocQueryError::Llm("script exhausted".to_string())),
        }
    }

    fn provider(&self) -> &str {
        "scripted"
    }
}

pub fn orchestrator(store: &Arc<FakeStore>, llm: Option<&Arc<ScriptedLlm>>) -> Orchestrator {
    let store: Arc<dyn DocumentStore> = store.clone();
    let llm = llm.map(|l| l.clone() as Arc<dyn LLMClient>);
    Orchestrator::new(store, llm, Arc::new(RoutingTables::default()))
}
