//! Frappe / ERPNext REST client

use super::{AggregateRequest, Document, DocumentStore, ListRequest, ReportOutput, ReportRequest};
use crate::config::{RetryConfig, StoreConfig};
use crate::error::{DocQueryError, Result};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::{json, Value};
use std::time::Duration;

/// Document store backed by a Frappe site
pub struct FrappeStore {
    http_client: reqwest::Client,
    base_url: Url,
    auth_header: Option<String>,
    retry: RetryConfig,
}

/// Outcome of one HTTP attempt
enum Attempt {
    Done(Value),
    Retry(String),
    Fail(String),
}

impl FrappeStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| DocQueryError::Config(format!("invalid store url '{}': {}", config.url, e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DocQueryError::Http)?;

        let auth_header = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(format!("token {}:{}", key, secret))
            }
            _ => {
                tracing::warn!("No store API credentials configured, requests are anonymous");
                None
            }
        };

        Ok(Self {
            http_client,
            base_url,
            auth_header,
            retry: config.retry.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DocQueryError::Config(format!("store url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send with bounded retry: transport errors, 429 and 5xx are retried,
    /// other 4xx fail immediately.
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.retry.delay_for(attempt - 1);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying store request");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(method.clone(), url.clone(), body).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(message) => return Err(DocQueryError::Store(message)),
                Attempt::Retry(message) => {
                    tracing::warn!(attempt, error = %message, "Store request failed, will retry");
                    last_error = message;
                }
            }
        }

        Err(DocQueryError::Store(format!(
            "request failed after {} attempts: {}",
            attempts, last_error
        )))
    }

    async fn attempt(&self, method: Method, url: Url, body: Option<&Value>) -> Attempt {
        let mut req = self.http_client.request(method, url);
        if let Some(ref auth) = self.auth_header {
            req = req.header("Authorization", auth);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(format!("request failed: {}", e)),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return Attempt::Retry(format!("failed to read response body: {}", e)),
        };

        if !status.is_success() {
            let message = format!("HTTP {}: {}", status.as_u16(), text);
            return if status.is_server_error() || status.as_u16() == 429 {
                Attempt::Retry(message)
            } else {
                Attempt::Fail(message)
            };
        }

        if text.trim().is_empty() {
            return Attempt::Done(Value::Null);
        }
        match serde_json::from_str(&text) {
            Ok(value) => Attempt::Done(value),
            Err(e) => Attempt::Fail(format!("failed to parse response: {}", e)),
        }
    }
}

fn with_context(err: DocQueryError, context: String) -> DocQueryError {
    match err {
        DocQueryError::Store(message) => DocQueryError::Store(format!("{}: {}", context, message)),
        other => other,
    }
}

/// Pull `data` (resource API) or `message` (method API) out of a response
fn payload(mut value: Value) -> Value {
    match value.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => data,
        _ => value.get_mut("message").map(Value::take).unwrap_or(Value::Null),
    }
}

fn into_documents(value: Value) -> Vec<Document> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(doc) => Some(doc),
                _ => None,
            })
            .collect(),
        Value::Object(doc) => vec![doc],
        _ => Vec::new(),
    }
}

fn into_document(value: Value) -> Document {
    match value {
        Value::Object(doc) => doc,
        _ => Document::new(),
    }
}

#[async_trait]
impl DocumentStore for FrappeStore {
    async fn get(&self, doctype: &str, name: &str) -> Result<Document> {
        let url = self.url(&["api", "resource", doctype, name])?;
        let response = self
            .send(Method::GET, url, None)
            .await
            .map_err(|e| with_context(e, format!("failed to get document {}/{}", doctype, name)))?;
        tracing::info!(doctype, name, "Document retrieved");
        Ok(into_document(payload(response)))
    }

    async fn list(&self, request: &ListRequest) -> Result<Vec<Document>> {
        let mut url = self.url(&["api", "resource", &request.doctype])?;
        {
            let mut query = url.query_pairs_mut();
            if !request.fields.is_empty() {
                query.append_pair("fields", &serde_json::to_string(&request.fields)?);
            }
            if !request.filters.is_empty() {
                query.append_pair("filters", &serde_json::to_string(&request.filters)?);
            }
            if let Some(limit) = request.limit {
                query.append_pair("limit_page_length", &limit.to_string());
            }
        }
        let response = self.send(Method::GET, url, None).await.map_err(|e| {
            with_context(e, format!("failed to get document list for {}", request.doctype))
        })?;
        Ok(into_documents(payload(response)))
    }

    async fn search(&self, doctype: &str, query: &str, page_size: usize) -> Result<Vec<Document>> {
        let mut url = self.url(&["api", "method", "frappe.desk.search.search_link"])?;
        url.query_pairs_mut()
            .append_pair("doctype", doctype)
            .append_pair("txt", query)
            .append_pair("page_length", &page_size.to_string());

        let response = self.send(Method::GET, url, None).await.map_err(|e| {
            with_context(e, format!("failed to search documents for {}", doctype))
        })?;

        // search_link answers with {value, description}; expose `value` as `name`
        let documents = into_documents(payload(response))
            .into_iter()
            .map(|mut doc| {
                if !doc.contains_key("name") {
                    if let Some(value) = doc.get("value").cloned() {
                        doc.insert("name".to_string(), value);
                    }
                }
                doc
            })
            .collect::<Vec<_>>();

        tracing::info!(doctype, query, results = documents.len(), "Search completed");
        Ok(documents)
    }

    async fn create(&self, doctype: &str, data: &Document) -> Result<Document> {
        let url = self.url(&["api", "resource", doctype])?;
        let body = Value::Object(data.clone());
        let response = self
            .send(Method::POST, url, Some(&body))
            .await
            .map_err(|e| with_context(e, format!("failed to create {} document", doctype)))?;
        Ok(into_document(payload(response)))
    }

    async fn update(&self, doctype: &str, name: &str, data: &Document) -> Result<Document> {
        let url = self.url(&["api", "resource", doctype, name])?;
        let body = Value::Object(data.clone());
        let response = self
            .send(Method::PUT, url, Some(&body))
            .await
            .map_err(|e| with_context(e, format!("failed to update document {}/{}", doctype, name)))?;
        Ok(into_document(payload(response)))
    }

    async fn delete(&self, doctype: &str, name: &str) -> Result<()> {
        let url = self.url(&["api", "resource", doctype, name])?;
        self.send(Method::DELETE, url, None)
            .await
            .map_err(|e| with_context(e, format!("failed to delete document {}/{}", doctype, name)))?;
        tracing::info!(doctype, name, "Document deleted");
        Ok(())
    }

    async fn aggregate(&self, request: &AggregateRequest) -> Result<Vec<Document>> {
        let url = self.url(&["api", "method", "frappe.client.get_list"])?;

        let mut body = json!({ "doctype": request.doctype });
        if !request.fields.is_empty() {
            body["fields"] = json!(request.fields);
        }
        if !request.filters.is_empty() {
            body["filters"] = Value::Object(request.filters.clone());
        }
        if let Some(ref group_by) = request.group_by {
            body["group_by"] = json!(group_by);
        }
        if let Some(ref order_by) = request.order_by {
            body["order_by"] = json!(order_by);
        }
        if let Some(limit) = request.limit {
            body["limit_page_length"] = json!(limit);
        }

        let response = self.send(Method::POST, url, Some(&body)).await.map_err(|e| {
            with_context(e, format!("aggregation query failed for {}", request.doctype))
        })?;
        let rows = into_documents(payload(response));
        tracing::info!(
            doctype = %request.doctype,
            group_by = ?request.group_by,
            result_count = rows.len(),
            "Aggregation query executed"
        );
        Ok(rows)
    }

    async fn run_report(&self, request: &ReportRequest) -> Result<ReportOutput> {
        let url = self.url(&["api", "method", "frappe.desk.query_report.run"])?;

        let mut body = json!({ "report_name": request.report_name });
        if !request.filters.is_empty() {
            body["filters"] = Value::Object(request.filters.clone());
        }

        let response = self.send(Method::POST, url, Some(&body)).await.map_err(|e| {
            with_context(e, format!("report query failed for {}", request.report_name))
        })?;

        let message = payload(response);
        let columns = message
            .get("columns")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let data = message
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        tracing::info!(
            report_name = %request.report_name,
            columns = columns.len(),
            rows = data.len(),
            "Report executed"
        );
        Ok(ReportOutput { columns, data })
    }
}
