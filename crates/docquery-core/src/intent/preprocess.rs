//! Keyword preprocessing for plain list queries
//!
//! Runs before any LLM call: "list X" must never be read as an aggregation.

use super::{Action, Intent, IntentSource};
use crate::tables::RoutingTables;

const PREPROCESSING_CONFIDENCE: f64 = 0.95;

/// Classify obvious list queries; `None` defers to the LLM extractor
pub fn preprocess(query: &str, tables: &RoutingTables) -> Option<Intent> {
    let query_lower = query.to_lowercase();

    if !tables.has_list_signal(&query_lower) || tables.has_aggregation_signal(&query_lower) {
        return None;
    }

    let doctype = tables
        .doctype_for(&query_lower)
        .unwrap_or(tables.list_default_doctype.as_str())
        .to_string();

    tracing::info!(query, doctype = %doctype, "Preprocessing detected simple list query");

    Some(
        Intent::new(Action::List, doctype, IntentSource::Preprocessing)
            .with_confidence(PREPROCESSING_CONFIDENCE)
            .normalize(),
    )
}
