//! Query orchestration
//!
//! Sequences classification, entity resolution, parameter synthesis,
//! dispatch and formatting for one query. Every outcome, including
//! failures, is returned as a [`ChatResponse`].

use crate::config::Config;
use crate::dispatch::{ToolCall, ToolDispatcher, ToolOutput};
use crate::error::{DocQueryError, Result};
use crate::format::{format_upstream_error, DataQuality, FormattedResponse, ResponseFormatter};
use crate::intent::{is_exact_id, preprocess, route_fallback, Action, Intent, IntentExtractor, Tool};
use crate::llm::{build_llm_client, LLMClient};
use crate::resolve::EntityResolver;
use crate::store::{DocumentStore, FrappeStore};
use crate::synth::ParameterSynthesizer;
use crate::tables::RoutingTables;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Reply for queries unrelated to the business backend
pub const DECLINE_MESSAGE: &str = "I'm an ERPNext assistant specialized in helping you with your business data \
(customers, invoices, projects, items, etc.). For general questions or other topics, please use a \
general-purpose AI assistant.";

/// Reply when the pipeline produced neither a result nor an error
pub const UNSPECIFIC_MESSAGE: &str = "Please be more specific about what information you need.";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything the exposed surface returns for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// RFC 3339
    pub timestamp: String,
    pub tools_called: Vec<String>,
    pub response: String,
    pub data_quality: DataQuality,
    /// Byte length of `response`
    pub data_size: usize,
    pub is_valid_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    fn new(tools_called: &[Tool], formatted: FormattedResponse, error: Option<String>) -> Self {
        let response = formatted.text;
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tools_called: tools_called.iter().map(|t| t.to_string()).collect(),
            data_size: response.len(),
            is_valid_data: error.is_none() && !response.trim().is_empty(),
            response,
            data_quality: formatted.data_quality,
            error,
        }
    }

    fn failure(tools_called: &[Tool], err: &DocQueryError) -> Self {
        let text = if err.is_upstream() {
            format_upstream_error(&err.to_string())
        } else {
            format!("Error processing query: {}", err)
        };
        let formatted = FormattedResponse {
            text,
            data_quality: DataQuality::Error,
        };
        Self::new(tools_called, formatted, Some(err.to_string()))
    }
}

/// Result of the classification stages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classified {
    pub intent: Intent,
    /// The LLM answered 429 during classification
    pub llm_rate_limited: bool,
}

/// How an action is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Terminal: fixed decline text, no tools
    Decline,
    /// LLM parameter synthesis, then one dispatch
    Synthesize,
    /// Backend search on the raw entity text
    Search,
    /// Optional entity resolution, then one dispatch
    Lookup { entity_required: bool },
}

impl Strategy {
    fn for_action(action: Action) -> Self {
        match action {
            Action::NonRelated => Self::Decline,
            Action::Aggregate | Action::Report | Action::Create | Action::Update => Self::Synthesize,
            Action::Search => Self::Search,
            Action::Delete => Self::Lookup { entity_required: true },
            Action::Get | Action::List | Action::Analyze | Action::Dashboard => {
                Self::Lookup { entity_required: false }
            }
        }
    }

    /// A literal document ID is fetched directly, whatever action was named
    fn for_intent(intent: &Intent) -> Self {
        if !intent.is_backend_related {
            return Self::Decline;
        }
        match Self::for_action(intent.action) {
            Self::Search
                if intent.tool == Some(Tool::GetDocument) && is_exact_id(&intent.entity_name) =>
            {
                Self::Lookup { entity_required: false }
            }
            strategy => strategy,
        }
    }
}

/// Tools that address a single document and are useless without one
fn needs_entity(tool: Tool) -> bool {
    matches!(
        tool,
        Tool::GetDocument
            | Tool::AnalyzeDocument
            | Tool::UpdateDocument
            | Tool::DeleteDocument
            | Tool::GetProjectStatus
            | Tool::AnalyzeProjectTimeline
    )
}

/// The query pipeline; one instance serves every request
pub struct Orchestrator {
    tables: Arc<RoutingTables>,
    extractor: Option<IntentExtractor>,
    resolver: EntityResolver,
    synthesizer: ParameterSynthesizer,
    dispatcher: ToolDispatcher,
    formatter: ResponseFormatter,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        llm: Option<Arc<dyn LLMClient>>,
        tables: Arc<RoutingTables>,
    ) -> Self {
        Self {
            extractor: llm
                .clone()
                .map(|client| IntentExtractor::new(client, Arc::clone(&tables))),
            resolver: EntityResolver::new(Arc::clone(&store), tables.search_page_size),
            synthesizer: ParameterSynthesizer::new(llm.clone()),
            dispatcher: ToolDispatcher::new(store, tables.list_page_size),
            formatter: ResponseFormatter::new(llm),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tables,
        }
    }

    /// Wire up the Frappe store and the configured LLM
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn DocumentStore> = Arc::new(FrappeStore::new(&config.store)?);
        let llm = build_llm_client(&config.llm)?;
        let tables = Arc::new(RoutingTables::new(&config.routing));
        Ok(Self::new(store, llm, tables).with_request_timeout(config.request_timeout()))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn tables(&self) -> &RoutingTables {
        &self.tables
    }

    pub fn has_llm(&self) -> bool {
        self.extractor.is_some()
    }

    /// Run the classification stages only: preprocessing, then the LLM,
    /// then the fallback router.
    pub async fn classify(&self, query: &str) -> Classified {
        if let Some(intent) = preprocess(query, &self.tables) {
            return Classified {
                intent,
                llm_rate_limited: false,
            };
        }

        let Some(extractor) = self.extractor.as_ref() else {
            tracing::info!("No LLM configured, using fallback routing");
            return Classified {
                intent: route_fallback(query, &self.tables),
                llm_rate_limited: false,
            };
        };

        match extractor.extract(query).await {
            Ok(intent) => Classified {
                intent,
                llm_rate_limited: false,
            },
            Err(e) => {
                let llm_rate_limited = e.is_rate_limit();
                if llm_rate_limited {
                    tracing::warn!(error = %e, "LLM rate limited during classification, using fallback routing");
                } else {
                    tracing::warn!(error = %e, "AI extraction failed, using fallback routing");
                }
                Classified {
                    intent: route_fallback(query, &self.tables),
                    llm_rate_limited,
                }
            }
        }
    }

    /// Answer one natural-language query. Never fails: errors are folded
    /// into the response with `data_quality = error`.
    pub async fn resolve_and_execute(&self, query: &str) -> ChatResponse {
        let mut tools_called = Vec::new();
        let outcome =
            tokio::time::timeout(self.request_timeout, self.run(query, &mut tools_called)).await;
        match outcome {
            Ok(response) => response,
            Err(_) => {
                let err = DocQueryError::Timeout(self.request_timeout.as_secs());
                tracing::warn!(error = %err, tools = ?tools_called, "Query abandoned");
                ChatResponse::failure(&tools_called, &err)
            }
        }
    }

    /// Dispatch a prepared tool call directly, under the request deadline
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput> {
        tokio::time::timeout(self.request_timeout, self.dispatcher.dispatch(call))
            .await
            .map_err(|_| DocQueryError::Timeout(self.request_timeout.as_secs()))?
    }

    async fn run(&self, query: &str, tools_called: &mut Vec<Tool>) -> ChatResponse {
        let query = query.trim();
        if query.is_empty() {
            return ChatResponse::failure(&[], &DocQueryError::InvalidInput("query is empty".to_string()));
        }
        tracing::info!(query, "Processing query");

        let Classified {
            intent,
            llm_rate_limited,
        } = self.classify(query).await;

        let strategy = Strategy::for_intent(&intent);
        tracing::info!(action = %intent.action, source = ?intent.source, ?strategy, "Routing query");

        if strategy == Strategy::Decline {
            return ChatResponse::new(
                &[],
                FormattedResponse {
                    text: DECLINE_MESSAGE.to_string(),
                    data_quality: DataQuality::NotApplicable,
                },
                None,
            );
        }

        match self.execute(strategy, &intent, query, tools_called).await {
            Ok(Some(output)) => {
                let formatted = self.formatter.format(query, &output, llm_rate_limited).await;
                ChatResponse::new(tools_called, formatted, None)
            }
            Ok(None) => ChatResponse::new(
                tools_called,
                FormattedResponse {
                    text: UNSPECIFIC_MESSAGE.to_string(),
                    data_quality: DataQuality::Low,
                },
                None,
            ),
            Err(e) => {
                tracing::warn!(error = %e, action = %intent.action, "Query failed");
                ChatResponse::failure(tools_called, &e)
            }
        }
    }

    /// Carry out one strategy, recording every tool invoked
    async fn execute(
        &self,
        strategy: Strategy,
        intent: &Intent,
        query: &str,
        tools_called: &mut Vec<Tool>,
    ) -> Result<Option<ToolOutput>> {
        let call = match strategy {
            Strategy::Decline => return Ok(None),
            Strategy::Synthesize => {
                if intent.requires_search {
                    let name = self.resolve_entity(intent, tools_called).await?;
                    let resolved = intent.clone().with_entity(name, false);
                    self.synthesizer.synthesize(&resolved, query).await?
                } else {
                    self.synthesizer.synthesize(intent, query).await?
                }
            }
            Strategy::Search => {
                if intent.doctype.is_empty() {
                    return Ok(None);
                }
                ToolCall::with_entity(Tool::SearchDocuments, &intent.doctype, &intent.entity_name)
            }
            Strategy::Lookup { entity_required } => {
                let tool = intent
                    .tool
                    .or_else(|| intent.action.default_tool())
                    .unwrap_or(Tool::AnalyzeDocument);

                if intent.entity_name.is_empty() {
                    if entity_required {
                        return Err(DocQueryError::InvalidInput(format!(
                            "a document name is required to {} {}",
                            intent.action, intent.doctype
                        )));
                    }
                    if needs_entity(tool) {
                        return Ok(None);
                    }
                    ToolCall::new(tool, intent.params.clone())
                } else if intent.requires_search {
                    let name = self.resolve_entity(intent, tools_called).await?;
                    ToolCall::with_entity(tool, &intent.doctype, &name)
                } else {
                    ToolCall::with_entity(tool, &intent.doctype, &intent.entity_name)
                }
            }
        };

        tools_called.push(call.tool);
        self.dispatcher.dispatch(&call).await.map(Some)
    }

    /// Search for the intent's entity; an empty result is an error
    async fn resolve_entity(&self, intent: &Intent, tools_called: &mut Vec<Tool>) -> Result<String> {
        if intent.doctype.is_empty() {
            return Err(DocQueryError::InvalidInput(format!(
                "cannot resolve '{}' without a document type",
                intent.entity_name
            )));
        }
        tools_called.push(Tool::SearchDocuments);
        let found = self
            .resolver
            .resolve(&intent.doctype, &intent.entity_name)
            .await?
            .require(&intent.entity_name)?;
        Ok(found.entity_name)
    }
}
