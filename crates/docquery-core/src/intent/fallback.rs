//! Regex router used when the LLM is unavailable or failed

use super::{Action, Intent, IntentSource, Tool};
use crate::tables::RoutingTables;
use lazy_static::lazy_static;
use regex::Regex;

/// Fixed confidence of every fallback intent; telemetry only
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const NAME_KEYWORDS: &[&str] = &["titled", "named", "called", "title", "name"];

lazy_static! {
    static ref QUOTED_RE: Regex = Regex::new(r#"["']([^"']+)["']"#).unwrap();
    static ref UNTIL_PUNCTUATION_RE: Regex = Regex::new(r"^([^,.?!]+)").unwrap();
    static ref OF_FOR_DOCTYPE_RE: Regex =
        Regex::new(r"(?:of|for)\s+(?:Project|Customer|Item|Task|Employee)\s+([^,.?!]+)").unwrap();
}

/// Pull an entity reference out of free text.
///
/// Tried in order: a quoted substring, the text after a naming keyword,
/// then the text after "of/for <Doctype>".
pub fn extract_entity_name(query: &str) -> String {
    if let Some(caps) = QUOTED_RE.captures(query) {
        return caps[1].trim().to_string();
    }

    // ASCII lowering keeps byte offsets aligned with `query`
    let lower = query.to_ascii_lowercase();
    for keyword in NAME_KEYWORDS {
        let Some(idx) = lower.find(keyword) else {
            continue;
        };
        let mut after = query[idx + keyword.len()..].trim();
        after = after.strip_prefix(':').unwrap_or(after);
        after = after.strip_prefix("is").unwrap_or(after).trim();

        if let Some(caps) = UNTIL_PUNCTUATION_RE.captures(after) {
            let candidate = caps[1].trim().trim_matches(|c| c == '"' || c == '\'');
            if !candidate.is_empty() {
                return candidate.to_string();
            }
        }
    }

    if let Some(caps) = OF_FOR_DOCTYPE_RE.captures(query) {
        return caps[1]
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
    }

    String::new()
}

/// Build a low-confidence intent without any LLM involvement
pub fn route_fallback(query: &str, tables: &RoutingTables) -> Intent {
    let lower = query.to_lowercase();
    let entity = extract_entity_name(query);

    let intent = if lower.contains("portfolio") || lower.contains("dashboard") {
        Intent::new(Action::Dashboard, "", IntentSource::Fallback)
    } else if !entity.is_empty() && lower.contains("project") {
        let (action, tool) = if lower.contains("status") {
            (Action::Analyze, Tool::GetProjectStatus)
        } else if lower.contains("timeline") {
            (Action::Analyze, Tool::AnalyzeProjectTimeline)
        } else {
            (Action::Get, Tool::GetDocument)
        };
        Intent::new(action, "Project", IntentSource::Fallback)
            .with_tool(tool)
            .with_entity(entity, true)
    } else {
        Intent::new(Action::List, tables.fallback_doctype.clone(), IntentSource::Fallback)
            .with_param("page_size", tables.fallback_page_size)
    };

    let intent = intent.with_confidence(FALLBACK_CONFIDENCE).normalize();
    tracing::info!(
        action = %intent.action,
        doctype = %intent.doctype,
        entity = %intent.entity_name,
        "Fallback routing produced intent"
    );
    intent
}
