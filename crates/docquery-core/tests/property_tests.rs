//! Property-based tests for the routing and formatting invariants
//!
//! 1. List keywords without aggregation keywords never reach the LLM
//! 2. Literal identifiers are fetched directly, never searched
//! 3. Synthesized parameters keep the classified doctype and target
//! 4. Deterministic formatting is a pure function of its input
//! 5. Empty results always say so

use async_trait::async_trait;
use docquery_core::format::{detect_shape, format_without_llm};
use docquery_core::intent::preprocess;
use docquery_core::synth::ParameterSynthesizer;
use docquery_core::{Action, ChatMessage, Intent, IntentSource, LLMClient, Result, RoutingTables, Tool};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

fn list_signal_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("list"), Just("show all"), Just("give all"), Just("list all")]
}

fn doctype_term_strategy() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop_oneof![
        Just(("users", "User")),
        Just(("customers", "Customer")),
        Just(("sales invoices", "Sales Invoice")),
        Just(("projects", "Project")),
        Just(("suppliers", "Supplier")),
    ]
}

/// Filler words that contain no aggregation keyword
fn filler_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![Just("please"), Just("our"), Just("the"), Just("me"), Just("now")],
        0..4,
    )
    .prop_map(|words| words.join(" "))
}

fn exact_id_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{3,5}-[0-9]{4,6}"
}

fn entity_action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Get),
        Just(Action::Analyze),
        Just(Action::Search),
        Just(Action::Update),
        Just(Action::Delete),
    ]
}

fn list_payload_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec("[A-Za-z0-9 -]{1,20}", 1..30).prop_map(|names| {
        let data: Vec<Value> = names.iter().map(|n| json!({"name": n})).collect();
        json!({"data": data, "total_count": names.len()})
    })
}

fn payload_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        list_payload_strategy(),
        "[a-z ]{1,40}".prop_map(Value::String),
        ("[A-Z]{4}-[0-9]{4}", "[A-Za-z]{1,10}")
            .prop_map(|(name, status)| json!({"name": name, "status": status})),
        prop::collection::vec("[a-z]{1,8}", 1..5).prop_map(|labels| {
            let columns: Vec<Value> = labels.iter().map(|l| json!({"label": l})).collect();
            let row: Vec<Value> = labels.iter().map(|_| json!(1)).collect();
            json!({"columns": columns, "data": [row]})
        }),
    ]
}

fn empty_payload_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!({})),
        Just(json!([])),
        Just(json!("")),
        Just(json!({"data": [], "total_count": 0})),
    ]
}

/// LLM that always answers with the same completion
struct Fixed(String);

#[async_trait]
impl LLMClient for Fixed {
    async fn chat_completion(&self, _messages: Vec<ChatMessage>) -> Result<String> {
        Ok(self.0.clone())
    }

    fn provider(&self) -> &str {
        "fixed"
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

// ============================================================================
// Classification
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn list_queries_are_preprocessed(
        before in filler_strategy(),
        signal in list_signal_strategy(),
        (term, doctype) in doctype_term_strategy(),
        after in filler_strategy(),
    ) {
        let query = format!("{} {} {} {}", before, signal, term, after);
        let intent = preprocess(&query, &RoutingTables::default());

        prop_assert!(intent.is_some());
        let intent = intent.unwrap();
        prop_assert_eq!(intent.action, Action::List);
        prop_assert_eq!(intent.doctype.as_str(), doctype);
        prop_assert_eq!(intent.confidence, 0.95);
        prop_assert!(intent.entity_name.is_empty());
    }

    #[test]
    fn aggregation_keywords_defer_to_llm(
        signal in list_signal_strategy(),
        agg in prop_oneof![Just("top 5"), Just("total"), Just("count"), Just("highest")],
    ) {
        let query = format!("{} {} customers", signal, agg);
        prop_assert!(preprocess(&query, &RoutingTables::default()).is_none());
    }

    #[test]
    fn exact_ids_never_require_search(
        id in exact_id_strategy(),
        action in entity_action_strategy(),
        requires_search in any::<bool>(),
    ) {
        let intent = Intent::new(action, "Project", IntentSource::Llm)
            .with_entity(id.clone(), requires_search)
            .normalize();

        prop_assert!(!intent.requires_search);
        prop_assert_eq!(intent.tool, Some(Tool::GetDocument));
        prop_assert_eq!(intent.entity_name, id);
    }

    #[test]
    fn collection_actions_carry_no_entity(
        action in prop_oneof![Just(Action::List), Just(Action::Aggregate), Just(Action::Report)],
        entity in "[A-Za-z ]{1,20}",
    ) {
        let intent = Intent::new(action, "Customer", IntentSource::Llm)
            .with_entity(entity, true)
            .normalize();

        prop_assert!(intent.entity_name.is_empty());
        prop_assert!(!intent.requires_search);
    }
}

// ============================================================================
// Parameter synthesis
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn synthesis_keeps_classified_doctype(
        action in prop_oneof![Just(Action::Aggregate), Just(Action::Create), Just(Action::Update)],
        llm_doctype in "[A-Za-z ]{1,20}",
        llm_name in "[A-Z]{2}-[0-9]{3}",
    ) {
        let completion = json!({
            "doctype": llm_doctype,
            "name": llm_name,
            "data": {"customer_name": "Acme"},
            "fields": ["name"],
            "limit": 5,
        })
        .to_string();
        let synthesizer = ParameterSynthesizer::new(Some(Arc::new(Fixed(completion))));
        let intent = Intent::new(action, "Customer", IntentSource::Llm)
            .with_entity("CUST-0001", false)
            .normalize();

        let call = block_on(synthesizer.synthesize(&intent, "do something")).unwrap();

        prop_assert_eq!(call.params["doctype"].as_str(), Some("Customer"));
        if action == Action::Update {
            prop_assert_eq!(call.params["name"].as_str(), Some("CUST-0001"));
        }
    }
}

// ============================================================================
// Deterministic formatting
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fallback_formatting_is_pure(query in "[a-z ]{0,30}", payload in payload_strategy()) {
        prop_assert_eq!(detect_shape(&payload), detect_shape(&payload.clone()));
        prop_assert_eq!(
            format_without_llm(&query, &payload),
            format_without_llm(&query, &payload.clone())
        );
    }

    #[test]
    fn empty_results_are_stated(query in "[a-z ]{1,30}", payload in empty_payload_strategy()) {
        let text = format_without_llm(&query, &payload);
        prop_assert!(text.contains("No results found"));
        prop_assert!(!text.contains("Item 1"));
    }
}
