//! Document backend abstraction
//!
//! The store is an external collaborator: typed records (doctype + named
//! fields) behind get/list/search/create/update/delete/aggregate/report.
//! Failures carry the provider's diagnostic text verbatim so the error-aware
//! formatter can classify them.

mod frappe;

pub use frappe::FrappeStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A backend record: field name to JSON value
pub type Document = Map<String, Value>;

/// Parameters of a list call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    pub doctype: String,
    #[serde(default)]
    pub filters: Map<String, Value>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parameters of an aggregation (group-by) call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub doctype: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

/// Parameters of a report run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub report_name: String,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

/// Tabular report result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportOutput {
    /// Column descriptors (`{"label", "fieldname", ...}` objects or plain strings)
    pub columns: Vec<Value>,
    /// Rows, each an array of cell values aligned with `columns`
    pub data: Vec<Value>,
}

/// Generic document backend
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, doctype: &str, name: &str) -> Result<Document>;

    async fn list(&self, request: &ListRequest) -> Result<Vec<Document>>;

    async fn search(&self, doctype: &str, query: &str, page_size: usize) -> Result<Vec<Document>>;

    async fn create(&self, doctype: &str, data: &Document) -> Result<Document>;

    async fn update(&self, doctype: &str, name: &str, data: &Document) -> Result<Document>;

    async fn delete(&self, doctype: &str, name: &str) -> Result<()>;

    async fn aggregate(&self, request: &AggregateRequest) -> Result<Vec<Document>>;

    async fn run_report(&self, request: &ReportRequest) -> Result<ReportOutput>;
}
