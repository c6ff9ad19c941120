//! Intent classification
//!
//! Three layers produce an [`Intent`], tried in strict order:
//! - [`preprocess`]: keyword rules for obvious list queries, no LLM call
//! - [`llm_extractor`]: one structured-JSON LLM call
//! - [`fallback`]: regex router used when the LLM is absent or failed

pub mod fallback;
pub mod llm_extractor;
pub mod preprocess;

pub use fallback::{extract_entity_name, route_fallback};
pub use llm_extractor::IntentExtractor;
pub use preprocess::preprocess;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

lazy_static! {
    static ref EXACT_ID_RE: Regex = Regex::new(r"^[A-Z]{3,5}-\d{4,6}$").unwrap();
}

/// Whether an entity reference is a literal backend identifier (e.g. `PROJ-0001`)
pub fn is_exact_id(entity: &str) -> bool {
    EXACT_ID_RE.is_match(entity)
}

/// What the user wants to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Get,
    List,
    Search,
    Aggregate,
    Report,
    Create,
    Update,
    Delete,
    Analyze,
    Dashboard,
    NonRelated,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Get,
        Action::List,
        Action::Search,
        Action::Aggregate,
        Action::Report,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Analyze,
        Action::Dashboard,
        Action::NonRelated,
    ];

    /// Parse an LLM-provided action name.
    ///
    /// Never fails: synonyms fold into the closed set and anything
    /// unrecognised becomes [`Action::Analyze`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "get" | "get_document" | "details" => Self::Get,
            "list" | "list_all" => Self::List,
            "search" | "find" => Self::Search,
            "aggregate" => Self::Aggregate,
            "report" => Self::Report,
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "dashboard" | "portfolio" => Self::Dashboard,
            "non_related" | "non_erpnext" => Self::NonRelated,
            // analyze, status, timeline, metrics, risk, analysis, ...
            _ => Self::Analyze,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Search => "search",
            Self::Aggregate => "aggregate",
            Self::Report => "report",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Analyze => "analyze",
            Self::Dashboard => "dashboard",
            Self::NonRelated => "non_related",
        }
    }

    /// Tool this action dispatches to; `None` for non-related queries
    pub fn default_tool(&self) -> Option<Tool> {
        match self {
            Self::Get => Some(Tool::GetDocument),
            Self::List => Some(Tool::ListDocuments),
            Self::Search => Some(Tool::SearchDocuments),
            Self::Aggregate => Some(Tool::AggregateDocuments),
            Self::Report => Some(Tool::RunReport),
            Self::Create => Some(Tool::CreateDocument),
            Self::Update => Some(Tool::UpdateDocument),
            Self::Delete => Some(Tool::DeleteDocument),
            Self::Analyze => Some(Tool::AnalyzeDocument),
            Self::Dashboard => Some(Tool::PortfolioDashboard),
            Self::NonRelated => None,
        }
    }

    /// Actions that operate on a collection and never carry an entity
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List | Self::Aggregate | Self::Report)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend tool names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    GetDocument,
    ListDocuments,
    SearchDocuments,
    CreateDocument,
    UpdateDocument,
    DeleteDocument,
    AnalyzeDocument,
    AggregateDocuments,
    RunReport,
    PortfolioDashboard,
    GetProjectStatus,
    AnalyzeProjectTimeline,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetDocument => "get_document",
            Self::ListDocuments => "list_documents",
            Self::SearchDocuments => "search_documents",
            Self::CreateDocument => "create_document",
            Self::UpdateDocument => "update_document",
            Self::DeleteDocument => "delete_document",
            Self::AnalyzeDocument => "analyze_document",
            Self::AggregateDocuments => "aggregate_documents",
            Self::RunReport => "run_report",
            Self::PortfolioDashboard => "portfolio_dashboard",
            Self::GetProjectStatus => "get_project_status",
            Self::AnalyzeProjectTimeline => "analyze_project_timeline",
        }
    }

    /// Legacy project tools addressed by `project_name` instead of `{doctype, name}`
    pub fn takes_project_name(&self) -> bool {
        matches!(self, Self::GetProjectStatus | Self::AnalyzeProjectTimeline)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tool {
    type Err = crate::error::DocQueryError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        let tool = match s {
            "get_document" => Self::GetDocument,
            "list_documents" => Self::ListDocuments,
            "search_documents" => Self::SearchDocuments,
            "create_document" => Self::CreateDocument,
            "update_document" => Self::UpdateDocument,
            "delete_document" => Self::DeleteDocument,
            "analyze_document" => Self::AnalyzeDocument,
            "aggregate_documents" => Self::AggregateDocuments,
            "run_report" => Self::RunReport,
            "portfolio_dashboard" => Self::PortfolioDashboard,
            "get_project_status" => Self::GetProjectStatus,
            "analyze_project_timeline" => Self::AnalyzeProjectTimeline,
            other => {
                return Err(crate::error::DocQueryError::InvalidInput(format!(
                    "tool not found: {}",
                    other
                )))
            }
        };
        Ok(tool)
    }
}

/// Which layer produced an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Preprocessing,
    Llm,
    Fallback,
}

/// Structured classification of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: Action,
    pub doctype: String,
    pub entity_name: String,
    pub tool: Option<Tool>,
    /// Parameters for a direct dispatch (no entity involved)
    pub params: Map<String, Value>,
    pub requires_search: bool,
    pub is_backend_related: bool,
    /// Provenance signal for telemetry; never gates behavior
    pub confidence: f64,
    pub source: IntentSource,
}

impl Intent {
    /// A backend-related intent with the action's default tool
    pub fn new(action: Action, doctype: impl Into<String>, source: IntentSource) -> Self {
        Self {
            action,
            doctype: doctype.into(),
            entity_name: String::new(),
            tool: action.default_tool(),
            params: Map::new(),
            requires_search: false,
            is_backend_related: action != Action::NonRelated,
            confidence: 0.0,
            source,
        }
    }

    /// Terminal decline outcome
    pub fn non_related(confidence: f64, source: IntentSource) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            ..Self::new(Action::NonRelated, "", source)
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>, requires_search: bool) -> Self {
        self.entity_name = entity.into();
        self.requires_search = requires_search;
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Restore the structural invariants whatever the producing layer said:
    /// collection actions carry no entity, literal identifiers are fetched
    /// directly, and only a non-empty entity can require a search.
    pub fn normalize(mut self) -> Self {
        if self.action.is_collection() {
            self.entity_name.clear();
        }
        self.entity_name = self.entity_name.trim().to_string();

        if is_exact_id(&self.entity_name) {
            tracing::info!(id = %self.entity_name, "Entity is exact ID, skipping search");
            self.requires_search = false;
            self.tool = Some(Tool::GetDocument);
        }

        if self.entity_name.is_empty() {
            self.requires_search = false;
        }
        if !self.doctype.is_empty() && !self.params.contains_key("doctype") {
            self.params
                .insert("doctype".to_string(), Value::String(self.doctype.clone()));
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}
