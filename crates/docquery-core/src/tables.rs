//! Read-only routing tables
//!
//! Built once at startup from [`RoutingConfig`] and shared behind an `Arc`;
//! nothing mutates them afterwards.

use crate::config::RoutingConfig;

/// Query fragments that mark a plain listing request
const LIST_SIGNALS: &[&str] = &["list", "show all", "give all", "all "];

/// Query fragments that mark an aggregation, which outrank list signals
const AGGREGATION_SIGNALS: &[&str] = &[
    "top ", "bottom ", "sum", "total", "average", "count", "most", "highest", "lowest",
];

/// Term to doctype dictionary, scanned in order
const DOCTYPE_TERMS: &[(&str, &str)] = &[
    ("sales invoices", "Sales Invoice"),
    ("sales invoice", "Sales Invoice"),
    ("sales orders", "Sales Order"),
    ("sales order", "Sales Order"),
    ("purchase orders", "Purchase Order"),
    ("purchase order", "Purchase Order"),
    ("users", "User"),
    ("user", "User"),
    ("customers", "Customer"),
    ("customer", "Customer"),
    ("companies", "Company"),
    ("company", "Company"),
    ("items", "Item"),
    ("item", "Item"),
    ("warehouses", "Warehouse"),
    ("warehouse", "Warehouse"),
    ("projects", "Project"),
    ("project", "Project"),
    ("tasks", "Task"),
    ("task", "Task"),
    ("suppliers", "Supplier"),
    ("supplier", "Supplier"),
    ("employees", "Employee"),
    ("employee", "Employee"),
];

/// Immutable lookup tables and defaults consulted by the routing stages
#[derive(Debug, Clone)]
pub struct RoutingTables {
    doctype_terms: Vec<(String, String)>,
    list_signals: Vec<String>,
    aggregation_signals: Vec<String>,
    pub list_default_doctype: String,
    pub fallback_doctype: String,
    pub fallback_page_size: usize,
    pub search_page_size: usize,
    pub list_page_size: usize,
}

impl RoutingTables {
    pub fn new(config: &RoutingConfig) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            doctype_terms: DOCTYPE_TERMS
                .iter()
                .map(|(term, doctype)| (term.to_string(), doctype.to_string()))
                .collect(),
            list_signals: owned(LIST_SIGNALS),
            aggregation_signals: owned(AGGREGATION_SIGNALS),
            list_default_doctype: config.list_default_doctype.clone(),
            fallback_doctype: config.fallback_doctype.clone(),
            fallback_page_size: config.fallback_page_size,
            search_page_size: config.search_page_size,
            list_page_size: config.list_page_size,
        }
    }

    /// First doctype whose term occurs in the (lower-cased) query
    pub fn doctype_for(&self, query_lower: &str) -> Option<&str> {
        self.doctype_terms
            .iter()
            .find(|(term, _)| query_lower.contains(term.as_str()))
            .map(|(_, doctype)| doctype.as_str())
    }

    pub fn has_list_signal(&self, query_lower: &str) -> bool {
        self.list_signals.iter().any(|s| query_lower.contains(s.as_str()))
    }

    pub fn has_aggregation_signal(&self, query_lower: &str) -> bool {
        self.aggregation_signals
            .iter()
            .any(|s| query_lower.contains(s.as_str()))
    }

    /// `(term, doctype)` pairs, for prompt building
    pub fn doctype_terms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.doctype_terms
            .iter()
            .map(|(term, doctype)| (term.as_str(), doctype.as_str()))
    }
}

impl Default for RoutingTables {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctype_lookup() {
        let tables = RoutingTables::default();
        assert_eq!(tables.doctype_for("list all sales invoices"), Some("Sales Invoice"));
        assert_eq!(tables.doctype_for("show all customers"), Some("Customer"));
        assert_eq!(tables.doctype_for("list everything"), None);
    }

    #[test]
    fn test_signals() {
        let tables = RoutingTables::default();
        assert!(tables.has_list_signal("give user list"));
        assert!(tables.has_list_signal("show all warehouses"));
        assert!(!tables.has_list_signal("hello"));
        assert!(tables.has_aggregation_signal("top 5 customers"));
        assert!(tables.has_aggregation_signal("total sales"));
        assert!(!tables.has_aggregation_signal("list users"));
    }

    #[test]
    fn test_defaults_follow_config() {
        let config = RoutingConfig {
            list_default_doctype: "Item".to_string(),
            ..RoutingConfig::default()
        };
        let tables = RoutingTables::new(&config);
        assert_eq!(tables.list_default_doctype, "Item");
        assert_eq!(tables.fallback_doctype, "Project");
        assert_eq!(tables.search_page_size, 5);
    }
}
