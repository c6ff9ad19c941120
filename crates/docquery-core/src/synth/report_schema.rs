//! Report filter schemas

use serde_json::{Map, Value};

/// Filter conventions of a report family
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSchema {
    pub start_field: &'static str,
    pub end_field: &'static str,
    /// Defaults applied when the filter is absent
    pub defaults: &'static [(&'static str, &'static str)],
}

const FINANCIAL_STATEMENT: ReportSchema = ReportSchema {
    start_field: "period_start_date",
    end_field: "period_end_date",
    defaults: &[("periodicity", "Monthly")],
};

const DATE_RANGE: ReportSchema = ReportSchema {
    start_field: "from_date",
    end_field: "to_date",
    defaults: &[],
};

impl ReportSchema {
    /// Schema for a report name; financial statements use period fields
    pub fn for_report(report_name: &str) -> &'static ReportSchema {
        let normalized = report_name.trim().to_lowercase();
        if ["profit and loss", "balance sheet", "cash flow"]
            .iter()
            .any(|family| normalized.contains(family))
        {
            &FINANCIAL_STATEMENT
        } else {
            &DATE_RANGE
        }
    }
}

/// Rename date filters to the report's conventions and apply its defaults.
///
/// Only keys already present are renamed.
pub fn normalize_report_filters(report_name: &str, mut filters: Map<String, Value>) -> Map<String, Value> {
    let schema = ReportSchema::for_report(report_name);

    for (generic, specific) in [
        ("from_date", schema.start_field),
        ("period_start_date", schema.start_field),
        ("to_date", schema.end_field),
        ("period_end_date", schema.end_field),
    ] {
        if generic == specific {
            continue;
        }
        if let Some(value) = filters.remove(generic) {
            tracing::info!(report_name, from = generic, to = specific, "Mapped report filter");
            filters.insert(specific.to_string(), value);
        }
    }

    for (key, default) in schema.defaults {
        if !filters.contains_key(*key) {
            filters.insert(key.to_string(), Value::String(default.to_string()));
        }
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_schema_selection() {
        assert_eq!(ReportSchema::for_report("Balance Sheet").start_field, "period_start_date");
        assert_eq!(ReportSchema::for_report("Cash Flow").end_field, "period_end_date");
        assert_eq!(ReportSchema::for_report("Sales Analytics").start_field, "from_date");
    }

    #[test]
    fn test_period_fields_map_back_for_date_range_reports() {
        let filters = normalize_report_filters(
            "General Ledger",
            map(json!({"period_start_date": "2024-01-01", "company": "VK"})),
        );
        assert_eq!(filters["from_date"], "2024-01-01");
        assert!(!filters.contains_key("period_start_date"));
        assert!(!filters.contains_key("periodicity"));
    }

    #[test]
    fn test_existing_periodicity_kept() {
        let filters = normalize_report_filters(
            "Profit and Loss Statement",
            map(json!({"periodicity": "Yearly"})),
        );
        assert_eq!(filters["periodicity"], "Yearly");
        assert!(!filters.contains_key("period_start_date"));
    }
}
