//! Parameter synthesis for aggregate, report, create and update
//!
//! One extraction routine drives four declarative [`ExtractionSpec`]s:
//! prompt, fence stripping, JSON parsing, then forcing of the fields the
//! classification stage already established. The LLM never gets to pick
//! the doctype or the target document.

mod configs;
mod report_schema;

pub use configs::{AGGREGATE, CREATE, REPORT, UPDATE};
pub use report_schema::{normalize_report_filters, ReportSchema};

use crate::dispatch::ToolCall;
use crate::error::{DocQueryError, Result};
use crate::intent::{Action, Intent, Tool};
use crate::llm::json::parse_json_object;
use crate::llm::{ChatMessage, LLMClient};
use serde_json::{Map, Value};
use std::sync::Arc;

/// What a synthesizer knows before asking the LLM
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub query: &'a str,
    pub doctype: &'a str,
    pub entity_name: &'a str,
}

/// Declarative description of one synthesizer
pub struct ExtractionSpec {
    pub action: Action,
    pub tool: Tool,
    pub system_prompt: &'static str,
    pub prompt: fn(&SynthesisInput<'_>) -> String,
    /// Force known fields and check completeness; `Err` carries the reason
    pub post_validate: fn(&mut Map<String, Value>, &SynthesisInput<'_>) -> std::result::Result<(), String>,
}

impl ExtractionSpec {
    pub fn for_action(action: Action) -> Option<&'static ExtractionSpec> {
        match action {
            Action::Aggregate => Some(&AGGREGATE),
            Action::Report => Some(&REPORT),
            Action::Create => Some(&CREATE),
            Action::Update => Some(&UPDATE),
            _ => None,
        }
    }

    fn failure(&self, reason: impl Into<String>) -> DocQueryError {
        DocQueryError::ParameterSynthesis {
            action: self.action.to_string(),
            reason: reason.into(),
        }
    }
}

/// Runs extraction specs against the configured LLM
pub struct ParameterSynthesizer {
    client: Option<Arc<dyn LLMClient>>,
}

impl ParameterSynthesizer {
    pub fn new(client: Option<Arc<dyn LLMClient>>) -> Self {
        Self { client }
    }

    /// Build the tool call for an aggregate/report/create/update intent
    pub async fn synthesize(&self, intent: &Intent, query: &str) -> Result<ToolCall> {
        let spec = ExtractionSpec::for_action(intent.action).ok_or_else(|| {
            DocQueryError::InvalidInput(format!("no parameter synthesis for {} queries", intent.action))
        })?;

        let input = SynthesisInput {
            query,
            doctype: &intent.doctype,
            entity_name: &intent.entity_name,
        };
        let params = self.extract(spec, &input).await?;
        Ok(ToolCall::new(spec.tool, params))
    }

    /// Generic structured extraction
    pub async fn extract(
        &self,
        spec: &ExtractionSpec,
        input: &SynthesisInput<'_>,
    ) -> Result<Map<String, Value>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| spec.failure("LLM client not available"))?;

        tracing::info!(action = %spec.action, doctype = input.doctype, "Synthesizing parameters");

        let messages = vec![
            ChatMessage::system(spec.system_prompt),
            ChatMessage::user((spec.prompt)(input)),
        ];
        let response = client
            .chat_completion(messages)
            .await
            .map_err(|e| spec.failure(e.to_string()))?;
        tracing::debug!("Synthesis response: {}", response);

        let mut params = parse_json_object(&response).map_err(|e| {
            tracing::warn!(action = %spec.action, error = %e, "Failed to parse synthesized params");
            spec.failure(format!("invalid {} params JSON", spec.action))
        })?;

        (spec.post_validate)(&mut params, input).map_err(|reason| spec.failure(reason))?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentSource;
    use async_trait::async_trait;

    struct Scripted(&'static str);

    #[async_trait]
    impl LLMClient for Scripted {
        async fn chat_completion(&self, _messages: Vec<ChatMessage>) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn provider(&self) -> &str {
            "scripted"
        }
    }

    fn synthesizer(response: &'static str) -> ParameterSynthesizer {
        ParameterSynthesizer::new(Some(Arc::new(Scripted(response))))
    }

    #[tokio::test]
    async fn test_aggregate_forces_doctype() {
        let intent = Intent::new(Action::Aggregate, "Sales Invoice", IntentSource::Llm);
        let call = synthesizer(
            r#"```json
{"doctype": "Customer", "fields": ["customer", "SUM(grand_total) as total_revenue"], "group_by": "customer", "order_by": "total_revenue desc", "limit": 5, "filters": {}}
```"#,
        )
        .synthesize(&intent, "top 5 customers by revenue")
        .await
        .unwrap();

        assert_eq!(call.tool, Tool::AggregateDocuments);
        assert_eq!(call.params["doctype"], "Sales Invoice");
        assert_eq!(call.params["limit"], 5);
        assert_eq!(call.params["group_by"], "customer");
    }

    #[tokio::test]
    async fn test_update_forces_name() {
        let intent = Intent::new(Action::Update, "Project", IntentSource::Llm)
            .with_entity("PROJ-0001", false);
        let call = synthesizer(
            r#"{"doctype": "Task", "name": "TASK-9999", "data": {"status": "Completed"}}"#,
        )
        .synthesize(&intent, "update project PROJ-0001 status to Completed")
        .await
        .unwrap();

        assert_eq!(call.tool, Tool::UpdateDocument);
        assert_eq!(call.params["doctype"], "Project");
        assert_eq!(call.params["name"], "PROJ-0001");
        assert_eq!(call.params["data"]["status"], "Completed");
    }

    #[tokio::test]
    async fn test_create_without_data_fails() {
        let intent = Intent::new(Action::Create, "Customer", IntentSource::Llm);
        let err = synthesizer(r#"{"doctype": "Customer"}"#)
            .synthesize(&intent, "add a customer")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to process create query"));
    }

    #[tokio::test]
    async fn test_non_json_fails() {
        let intent = Intent::new(Action::Report, "", IntentSource::Llm);
        let err = synthesizer("Sure, running the Sales Analytics report now.")
            .synthesize(&intent, "run Sales Analytics report")
            .await
            .unwrap_err();
        assert!(matches!(err, DocQueryError::ParameterSynthesis { .. }));
    }

    #[tokio::test]
    async fn test_missing_client_fails() {
        let intent = Intent::new(Action::Aggregate, "Sales Invoice", IntentSource::Fallback);
        let err = ParameterSynthesizer::new(None)
            .synthesize(&intent, "top 5 customers")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to process aggregate query: LLM client not available"
        );
    }

    #[tokio::test]
    async fn test_unsupported_action() {
        let intent = Intent::new(Action::List, "User", IntentSource::Llm);
        assert!(matches!(
            synthesizer("{}").synthesize(&intent, "list users").await,
            Err(DocQueryError::InvalidInput(_))
        ));
    }
}
