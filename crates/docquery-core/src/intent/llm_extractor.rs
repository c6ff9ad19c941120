//! LLM-backed intent extraction

use super::{Action, Intent, IntentSource};
use crate::error::{DocQueryError, Result};
use crate::llm::json::parse_json_object;
use crate::llm::{ChatMessage, LLMClient};
use crate::tables::RoutingTables;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are an ERPNext query parser. Extract structured information \
from the user's query and respond ONLY with valid JSON with these fields: \
is_backend_related (bool), action (string), doctype (string), entity_name (string), \
requires_search (bool), confidence (0.0-1.0)";

const FEW_SHOTS: &[(&str, &str)] = &[
    ("what are you?", r#"{"is_backend_related":false,"action":"","doctype":"","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("hello", r#"{"is_backend_related":false,"action":"","doctype":"","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("what is 2+2?", r#"{"is_backend_related":false,"action":"","doctype":"","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("give user list", r#"{"is_backend_related":true,"action":"list","doctype":"User","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("give the list of companies", r#"{"is_backend_related":true,"action":"list","doctype":"Company","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("show all customers", r#"{"is_backend_related":true,"action":"list","doctype":"Customer","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("top 5 customers by revenue", r#"{"is_backend_related":true,"action":"aggregate","doctype":"Sales Invoice","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("show me total sales by customer", r#"{"is_backend_related":true,"action":"aggregate","doctype":"Sales Invoice","entity_name":"","requires_search":false,"confidence":0.9}"#),
    ("which items sold the most", r#"{"is_backend_related":true,"action":"aggregate","doctype":"Sales Invoice","entity_name":"","requires_search":false,"confidence":0.9}"#),
    ("run Sales Analytics report", r#"{"is_backend_related":true,"action":"report","doctype":"","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("get user john@example.com", r#"{"is_backend_related":true,"action":"get","doctype":"User","entity_name":"john@example.com","requires_search":false,"confidence":0.9}"#),
    ("Show me details of project PROJ-0001", r#"{"is_backend_related":true,"action":"get","doctype":"Project","entity_name":"PROJ-0001","requires_search":false,"confidence":0.95}"#),
    ("What's the status of project titled Website Redesign?", r#"{"is_backend_related":true,"action":"analyze","doctype":"Project","entity_name":"Website Redesign","requires_search":true,"confidence":0.9}"#),
    ("find customers in Berlin", r#"{"is_backend_related":true,"action":"search","doctype":"Customer","entity_name":"Berlin","requires_search":false,"confidence":0.8}"#),
    ("create a project named Website Redesign", r#"{"is_backend_related":true,"action":"create","doctype":"Project","entity_name":"","requires_search":false,"confidence":0.95}"#),
    ("update project PROJ-0001 status to completed", r#"{"is_backend_related":true,"action":"update","doctype":"Project","entity_name":"PROJ-0001","requires_search":false,"confidence":0.95}"#),
    ("delete customer CUST-00123", r#"{"is_backend_related":true,"action":"delete","doctype":"Customer","entity_name":"CUST-00123","requires_search":false,"confidence":0.9}"#),
    ("what's the default currency?", r#"{"is_backend_related":true,"action":"list","doctype":"Company","entity_name":"","requires_search":false,"confidence":0.9}"#),
    ("give details of the current company", r#"{"is_backend_related":true,"action":"list","doctype":"Company","entity_name":"","requires_search":false,"confidence":0.9}"#),
    ("show me the active user", r#"{"is_backend_related":true,"action":"list","doctype":"User","entity_name":"","requires_search":false,"confidence":0.9}"#),
    ("portfolio dashboard", r#"{"is_backend_related":true,"action":"dashboard","doctype":"Project","entity_name":"","requires_search":false,"confidence":0.9}"#),
];

/// Shape of the extraction JSON; every field is optional on the wire
#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default, alias = "is_erpnext_related")]
    is_backend_related: Option<bool>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    doctype: Option<String>,
    #[serde(default)]
    entity_name: Option<String>,
    #[serde(default)]
    requires_search: Option<bool>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Intent extractor using one LLM completion per query
pub struct IntentExtractor {
    client: Arc<dyn LLMClient>,
    tables: Arc<RoutingTables>,
}

impl IntentExtractor {
    pub fn new(client: Arc<dyn LLMClient>, tables: Arc<RoutingTables>) -> Self {
        Self { client, tables }
    }

    /// Classify a query.
    ///
    /// Call failures and unparseable answers are returned as errors
    /// (`RateLimited` for 429s, `Classification` otherwise) so the caller
    /// can route to the fallback.
    pub async fn extract(&self, query: &str) -> Result<Intent> {
        tracing::info!(provider = self.client.provider(), "Extracting intent with LLM");

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_intent_prompt(query, &self.tables)),
        ];

        let response = self.client.chat_completion(messages).await.map_err(|e| {
            if e.is_rate_limit() {
                DocQueryError::RateLimited(e.to_string())
            } else {
                DocQueryError::Classification(format!("failed to call LLM: {}", e))
            }
        })?;
        tracing::debug!("Intent response: {}", response);

        let intent = parse_intent_response(&response)?;
        tracing::info!(
            provider = self.client.provider(),
            action = %intent.action,
            doctype = %intent.doctype,
            entity = %intent.entity_name,
            confidence = intent.confidence,
            "AI extracted intent successfully"
        );
        Ok(intent)
    }
}

fn build_intent_prompt(query: &str, tables: &RoutingTables) -> String {
    let mut seen = BTreeSet::new();
    let synonyms = tables
        .doctype_terms()
        .filter(|(_, doctype)| seen.insert(*doctype))
        .map(|(term, doctype)| format!("\"{}\" → \"{}\"", term, doctype))
        .collect::<Vec<_>>()
        .join(", ");

    let examples = FEW_SHOTS
        .iter()
        .map(|(q, r)| format!("Query: \"{}\"\nResponse: {}", q, r))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"CRITICAL RULES (APPLY IN THIS ORDER):
1. If the query contains "list", "all", "show all", "give list" → action is ALWAYS "list"
2. If the query asks for "top N", "bottom N", "most", "highest", "sum", "total", "average", "count" → action is "aggregate"
3. If the query names a report to run → action is "report"
4. If the query mentions ONE specific document by name or ID → action is "get"
5. "list", "aggregate" and "report" ALWAYS have an empty entity_name ""

User Query: "{query}"

Fields:
1. is_backend_related: true for questions about business data (customers, invoices, users, items, projects, reports, sales); false for greetings, general knowledge, math, questions about you
2. action: one of get, list, search, aggregate, report, create, update, delete, analyze, dashboard
   - analyze: status, metrics, timeline or risk of ONE document
   - dashboard: portfolio overview of all projects
3. doctype: a valid ERPNext DocType. Map common terms: {synonyms}, "invoice" → "Sales Invoice"
   - NEVER invent doctypes like "QueryResponse" or "UserList"
   - empty when is_backend_related is false
4. entity_name: the EXACT name or ID of one document, otherwise ""
   - contextual words ("default", "current", "active", "primary") are NOT entities: use action "list" with entity_name ""
5. requires_search: true only when entity_name is free text rather than an exact ID

Respond with JSON only:
{{"is_backend_related": true/false, "action": "...", "doctype": "...", "entity_name": "...", "requires_search": true/false, "confidence": 0.0-1.0}}

Examples:

{examples}

Now respond for the user's query:"#
    )
}

/// Turn the completion into a normalized [`Intent`]
fn parse_intent_response(response: &str) -> Result<Intent> {
    let map = parse_json_object(response).map_err(|e| {
        tracing::warn!("Failed to parse AI response as JSON: {}", e);
        DocQueryError::Classification(format!("AI response was not valid JSON: {}", e))
    })?;

    let raw: RawIntent = serde_json::from_value(Value::Object(map))
        .map_err(|e| DocQueryError::Classification(format!("malformed intent JSON: {}", e)))?;

    let action_name = raw.action.unwrap_or_default();
    let confidence = raw.confidence.unwrap_or(0.0);

    // An answer without the flag still counts as related when it names an action
    let related = raw
        .is_backend_related
        .unwrap_or_else(|| !action_name.trim().is_empty());
    if !related {
        return Ok(Intent::non_related(confidence, IntentSource::Llm));
    }

    let action = Action::parse_lenient(&action_name);
    if action == Action::NonRelated {
        return Ok(Intent::non_related(confidence, IntentSource::Llm));
    }

    Ok(Intent::new(action, raw.doctype.unwrap_or_default().trim(), IntentSource::Llm)
        .with_entity(
            raw.entity_name.unwrap_or_default(),
            raw.requires_search.unwrap_or(false),
        )
        .with_confidence(confidence)
        .normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Tool;

    #[test]
    fn test_prompt_has_enough_examples() {
        assert!(FEW_SHOTS.len() >= 15);
        let prompt = build_intent_prompt("top 5 customers", &RoutingTables::default());
        assert!(prompt.contains("User Query: \"top 5 customers\""));
        assert!(prompt.contains("\"sales invoices\" → \"Sales Invoice\""));
        assert!(prompt.contains("what's the default currency?"));
    }

    #[test]
    fn test_every_example_parses() {
        for (query, response) in FEW_SHOTS {
            assert!(parse_intent_response(response).is_ok(), "example for {}", query);
        }
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "```json\n{\"is_backend_related\":true,\"action\":\"aggregate\",\"doctype\":\"Sales Invoice\",\"entity_name\":\"customers\",\"requires_search\":true,\"confidence\":0.9}\n```";
        let intent = parse_intent_response(response).unwrap();
        assert_eq!(intent.action, Action::Aggregate);
        assert_eq!(intent.tool, Some(Tool::AggregateDocuments));
        assert!(intent.entity_name.is_empty());
        assert!(!intent.requires_search);
    }

    #[test]
    fn test_parse_legacy_related_key() {
        let response = r#"{"is_erpnext_related":false,"action":"","confidence":0.95}"#;
        let intent = parse_intent_response(response).unwrap();
        assert!(!intent.is_backend_related);
        assert_eq!(intent.action, Action::NonRelated);
        assert_eq!(intent.tool, None);
    }

    #[test]
    fn test_parse_exact_id_overrides_llm() {
        let response = r#"{"is_backend_related":true,"action":"analyze","doctype":"Project","entity_name":"PROJ-0001","requires_search":true,"confidence":0.7}"#;
        let intent = parse_intent_response(response).unwrap();
        assert!(!intent.requires_search);
        assert_eq!(intent.tool, Some(Tool::GetDocument));
    }

    #[test]
    fn test_parse_unknown_action_defaults_to_analyze() {
        let response = r#"{"is_backend_related":true,"action":"risk_assessment","doctype":"Project","entity_name":"Apollo","requires_search":true}"#;
        let intent = parse_intent_response(response).unwrap();
        assert_eq!(intent.action, Action::Analyze);
        assert_eq!(intent.tool, Some(Tool::AnalyzeDocument));
        assert!(intent.requires_search);
    }

    #[test]
    fn test_parse_prose_is_classification_error() {
        let err = parse_intent_response("I think you want a list of users.").unwrap_err();
        assert!(matches!(err, DocQueryError::Classification(_)));
    }
}
