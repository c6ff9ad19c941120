//! Entity resolution: free-text reference to canonical identifier

use crate::error::{DocQueryError, Result};
use crate::store::{Document, DocumentStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fields tried, in order, to read an identifier off a search hit
const IDENTIFIER_FIELDS: &[&str] = &[
    "name",
    "title",
    "subject",
    "customer_name",
    "item_name",
    "employee_name",
];

/// Outcome of a resolution; an empty `entity_name` means nothing matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub entity_name: String,
    pub doctype: String,
    pub match_score: f64,
}

impl SearchResult {
    pub fn is_found(&self) -> bool {
        !self.entity_name.is_empty()
    }

    /// Turn an empty result into the user-facing not-found error
    pub fn require(self, term: &str) -> Result<Self> {
        if self.is_found() {
            Ok(self)
        } else {
            Err(DocQueryError::EntityNotFound {
                doctype: self.doctype,
                term: term.to_string(),
            })
        }
    }
}

/// Resolves references through the store's search; first hit wins
pub struct EntityResolver {
    store: Arc<dyn DocumentStore>,
    page_size: usize,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn DocumentStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }

    pub async fn resolve(&self, doctype: &str, term: &str) -> Result<SearchResult> {
        tracing::info!(doctype, search_term = term, "Searching for entity");

        let hits = self.store.search(doctype, term, self.page_size).await?;

        let entity_name = hits.first().map(identifier_of).unwrap_or_default();
        if entity_name.is_empty() {
            tracing::info!(doctype, search_term = term, "No entity matched");
        } else {
            tracing::info!(doctype, name = %entity_name, "Found entity");
        }

        Ok(SearchResult {
            match_score: if entity_name.is_empty() { 0.0 } else { 1.0 },
            entity_name,
            doctype: doctype.to_string(),
        })
    }
}

/// First non-empty string among the identifier fields
pub fn identifier_of(doc: &Document) -> String {
    IDENTIFIER_FIELDS
        .iter()
        .filter_map(|field| doc.get(*field).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
