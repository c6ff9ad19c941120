//! The four synthesizer configurations

use super::report_schema::normalize_report_filters;
use super::{ExtractionSpec, SynthesisInput};
use crate::intent::{Action, Tool};
use crate::store::{AggregateRequest, ReportRequest};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const JSON_ONLY: &str =
    "You extract parameters for ERPNext API calls. Respond with a single JSON object and nothing else.";

pub static AGGREGATE: ExtractionSpec = ExtractionSpec {
    action: Action::Aggregate,
    tool: Tool::AggregateDocuments,
    system_prompt: JSON_ONLY,
    prompt: aggregate_prompt,
    post_validate: validate_aggregate,
};

pub static REPORT: ExtractionSpec = ExtractionSpec {
    action: Action::Report,
    tool: Tool::RunReport,
    system_prompt: JSON_ONLY,
    prompt: report_prompt,
    post_validate: validate_report,
};

pub static CREATE: ExtractionSpec = ExtractionSpec {
    action: Action::Create,
    tool: Tool::CreateDocument,
    system_prompt: JSON_ONLY,
    prompt: create_prompt,
    post_validate: validate_create,
};

pub static UPDATE: ExtractionSpec = ExtractionSpec {
    action: Action::Update,
    tool: Tool::UpdateDocument,
    system_prompt: JSON_ONLY,
    prompt: update_prompt,
    post_validate: validate_update,
};

fn aggregate_prompt(input: &SynthesisInput<'_>) -> String {
    let query = input.query;
    let doctype = input.doctype;
    format!(
        r#"Extract aggregation parameters from this query.

Query: "{query}"
DocType: "{doctype}"

CRITICAL: You MUST use the provided DocType "{doctype}" exactly as given. DO NOT change it.

Determine:
1. doctype: MUST be "{doctype}"
2. fields: fields to select or aggregate (e.g. ["customer", "SUM(grand_total) as total_revenue"])
3. group_by: field to group by (e.g. "customer")
4. order_by: sort expression (e.g. "total_revenue desc")
5. limit: top N results (e.g. 5)
6. filters: filters to apply (e.g. {{"status": "Paid"}})

Common patterns for Sales Invoice:
- "top 5 customers by revenue" → limit=5, group_by="customer", order_by="total_revenue desc", fields=["customer", "SUM(grand_total) as total_revenue"]
- "total sales by customer" → group_by="customer", fields=["customer", "SUM(grand_total) as total"]
- "which items sold most" → group_by="item_code", order_by="quantity_sold desc", fields=["item_code", "SUM(qty) as quantity_sold"]

Respond with JSON only:
{{"doctype": "{doctype}", "fields": ["..."], "group_by": "...", "order_by": "...", "limit": 5, "filters": {{}}}}"#
    )
}

fn report_prompt(input: &SynthesisInput<'_>) -> String {
    let query = input.query;
    format!(
        r#"Extract report parameters from this query.

Query: "{query}"

Determine:
1. report_name: the exact ERPNext report name (e.g. "Sales Analytics", "Purchase Register", "Customer Ledger Summary")
2. filters: filters mentioned in the query (e.g. {{"company": "XYZ Corp", "from_date": "2024-01-01"}})

Common ERPNext reports:
- Sales Analytics, Sales Register, Sales Order Analysis
- Purchase Register, Purchase Analytics
- Customer Ledger Summary, Supplier Ledger Summary
- Stock Balance, Stock Ledger
- Profit and Loss Statement, Balance Sheet, Cash Flow
- General Ledger, Accounts Receivable

Use "from_date" and "to_date" for date ranges. Only include filters the query states.

Respond with JSON only:
{{"report_name": "...", "filters": {{}}}}"#
    )
}

fn create_prompt(input: &SynthesisInput<'_>) -> String {
    let query = input.query;
    let doctype = input.doctype;
    format!(
        r#"Extract field values from this document creation query.

Query: "{query}"
DocType: "{doctype}"

CRITICAL: Extract ONLY the field values stated in the query. Do NOT invent or assume values.

Common ERPNext DocType fields:
- Project: project_name (required), status, expected_start_date, expected_end_date, priority
- Customer: customer_name (required), customer_type, customer_group, territory
- Item: item_code (required), item_name, item_group, stock_uom
- Task: subject (required), project, status, priority, exp_start_date, exp_end_date
- User: email (required), first_name, last_name, enabled
- Company: company_name (required), abbr, default_currency

Examples:

Query: "create a project named Website Redesign"
Response: {{"doctype": "Project", "data": {{"project_name": "Website Redesign"}}}}

Query: "add a new customer called Acme Corp with type Company"
Response: {{"doctype": "Customer", "data": {{"customer_name": "Acme Corp", "customer_type": "Company"}}}}

Query: "create task Review PR with priority High for project PROJ-0001"
Response: {{"doctype": "Task", "data": {{"subject": "Review PR", "priority": "High", "project": "PROJ-0001"}}}}

Respond with JSON only:
{{"doctype": "{doctype}", "data": {{"field_name": "value"}}}}"#
    )
}

fn update_prompt(input: &SynthesisInput<'_>) -> String {
    let query = input.query;
    let doctype = input.doctype;
    let name = input.entity_name;
    format!(
        r#"Extract field values from this document update query.

Query: "{query}"
DocType: "{doctype}"
Document Name: "{name}"

CRITICAL: Extract ONLY the fields to change. Do NOT put the document name in "data".

Examples:

Query: "update project PROJ-0001 status to Completed"
Response: {{"doctype": "Project", "name": "PROJ-0001", "data": {{"status": "Completed"}}}}

Query: "change task TASK-0123 priority to High and status to Working"
Response: {{"doctype": "Task", "name": "TASK-0123", "data": {{"priority": "High", "status": "Working"}}}}

Query: "set customer CUST-0001 territory to North America"
Response: {{"doctype": "Customer", "name": "CUST-0001", "data": {{"territory": "North America"}}}}

Respond with JSON only:
{{"doctype": "{doctype}", "name": "{name}", "data": {{"field_name": "new_value"}}}}"#
    )
}

fn force_doctype(params: &mut Map<String, Value>, doctype: &str) -> Result<(), String> {
    if doctype.is_empty() {
        return Err("doctype is required".to_string());
    }
    params.insert("doctype".to_string(), Value::String(doctype.to_string()));
    Ok(())
}

fn require_data(params: &Map<String, Value>) -> Result<(), String> {
    match params.get("data") {
        Some(Value::Object(data)) if !data.is_empty() => Ok(()),
        _ => Err("no field data extracted from query".to_string()),
    }
}

fn validate_aggregate(params: &mut Map<String, Value>, input: &SynthesisInput<'_>) -> Result<(), String> {
    force_doctype(params, input.doctype)?;

    // LLMs sometimes answer "limit": "5"
    if let Some(Value::String(raw)) = params.get("limit") {
        let limit = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid limit '{}'", raw))?;
        params.insert("limit".to_string(), Value::from(limit));
    }
    match params.get("fields") {
        None | Some(Value::Null) => {
            params.insert("fields".to_string(), Value::Array(Vec::new()));
        }
        Some(Value::Array(fields)) if fields.iter().all(Value::is_string) => {}
        Some(_) => return Err("fields must be a list of strings".to_string()),
    }
    let filters = match params.remove("filters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(filters)) => filters,
        Some(Value::Array(conditions)) => filters_from_conditions(&conditions)?,
        Some(other) => return Err(format!("unsupported filters: {}", other)),
    };
    params.insert("filters".to_string(), Value::Object(filters));
    ensure_shape::<AggregateRequest>(params, "aggregate")
}

/// Fold Frappe's list form (`[field, op, value]` or
/// `[doctype, field, op, value]`) into `{field: [op, value]}`
fn filters_from_conditions(conditions: &[Value]) -> Result<Map<String, Value>, String> {
    let mut filters = Map::new();
    for condition in conditions {
        let parts = match condition.as_array().map(Vec::as_slice) {
            Some([field, op, value]) | Some([_, field, op, value]) => (field, op, value),
            _ => return Err(format!("unsupported filter condition: {}", condition)),
        };
        let (Some(field), Some(op)) = (parts.0.as_str(), parts.1.as_str()) else {
            return Err(format!("unsupported filter condition: {}", condition));
        };
        if filters.contains_key(field) {
            return Err(format!("more than one filter condition on '{}'", field));
        }
        filters.insert(field.to_string(), Value::Array(vec![Value::from(op), parts.2.clone()]));
    }
    Ok(filters)
}

/// The params must deserialize into the request the dispatcher builds
fn ensure_shape<T: DeserializeOwned>(params: &Map<String, Value>, what: &str) -> Result<(), String> {
    serde_json::from_value::<T>(Value::Object(params.clone()))
        .map(|_| ())
        .map_err(|e| format!("invalid {} parameters: {}", what, e))
}

fn validate_report(params: &mut Map<String, Value>, _input: &SynthesisInput<'_>) -> Result<(), String> {
    let report_name = params
        .get("report_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "report_name is required".to_string())?
        .to_string();

    let filters = match params.remove("filters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(filters)) => filters,
        Some(other) => return Err(format!("report filters must be an object, got {}", other)),
    };
    let filters = normalize_report_filters(&report_name, filters);

    params.insert("report_name".to_string(), Value::String(report_name));
    params.insert("filters".to_string(), Value::Object(filters));
    ensure_shape::<ReportRequest>(params, "report")
}

fn validate_create(params: &mut Map<String, Value>, input: &SynthesisInput<'_>) -> Result<(), String> {
    force_doctype(params, input.doctype)?;
    require_data(params)
}

fn validate_update(params: &mut Map<String, Value>, input: &SynthesisInput<'_>) -> Result<(), String> {
    force_doctype(params, input.doctype)?;
    if input.entity_name.is_empty() {
        return Err("document name is required".to_string());
    }
    params.insert(
        "name".to_string(),
        Value::String(input.entity_name.to_string()),
    );
    require_data(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input<'a>(doctype: &'a str, entity_name: &'a str) -> SynthesisInput<'a> {
        SynthesisInput {
            query: "q",
            doctype,
            entity_name,
        }
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_aggregate_coerces_limit_and_defaults() {
        let mut params = map(json!({"limit": "10", "group_by": "customer"}));
        validate_aggregate(&mut params, &input("Sales Invoice", "")).unwrap();
        assert_eq!(params["limit"], 10);
        assert_eq!(params["fields"], json!([]));
        assert_eq!(params["filters"], json!({}));
        assert_eq!(params["doctype"], "Sales Invoice");
    }

    #[test]
    fn test_aggregate_keeps_list_form_filters() {
        let mut params = map(json!({
            "filters": [["status", "=", "Paid"], ["Sales Invoice", "grand_total", ">", 1000]]
        }));
        validate_aggregate(&mut params, &input("Sales Invoice", "")).unwrap();
        assert_eq!(
            params["filters"],
            json!({"status": ["=", "Paid"], "grand_total": [">", 1000]})
        );
    }

    #[test]
    fn test_aggregate_rejects_filters_it_cannot_keep() {
        for filters in [
            json!([["status", "Paid"]]),
            json!([["posting_date", ">=", "2024-01-01"], ["posting_date", "<=", "2024-12-31"]]),
            json!("status = Paid"),
        ] {
            let mut params = map(json!({ "filters": filters }));
            assert!(
                validate_aggregate(&mut params, &input("Sales Invoice", "")).is_err(),
                "accepted {}",
                filters
            );
        }
    }

    #[test]
    fn test_aggregate_rejects_malformed_fields() {
        for bad in [json!({"group_by": ["customer"]}), json!({"limit": 5.5}), json!({"order_by": 3})] {
            let mut params = map(bad.clone());
            let err = validate_aggregate(&mut params, &input("Sales Invoice", "")).unwrap_err();
            assert!(err.starts_with("invalid aggregate parameters"), "{}: {}", bad, err);
        }
    }

    #[test]
    fn test_report_rejects_non_object_filters() {
        let mut params = map(json!({
            "report_name": "General Ledger",
            "filters": [["company", "=", "VK"]]
        }));
        assert!(validate_report(&mut params, &input("", "")).is_err());
    }

    #[test]
    fn test_aggregate_needs_established_doctype() {
        let mut params = map(json!({"doctype": "Sales Invoice"}));
        assert!(validate_aggregate(&mut params, &input("", "")).is_err());
    }

    #[test]
    fn test_report_requires_name() {
        let mut params = map(json!({"filters": {}}));
        assert!(validate_report(&mut params, &input("", "")).is_err());
    }

    #[test]
    fn test_report_filters_normalized() {
        let mut params = map(json!({
            "report_name": "Profit and Loss Statement",
            "filters": {"from_date": "2024-01-01", "to_date": "2024-12-31", "company": "VK"}
        }));
        validate_report(&mut params, &input("", "")).unwrap();
        assert_eq!(params["filters"]["period_start_date"], "2024-01-01");
        assert_eq!(params["filters"]["period_end_date"], "2024-12-31");
        assert_eq!(params["filters"]["periodicity"], "Monthly");
        assert!(params["filters"].get("from_date").is_none());
    }

    #[test]
    fn test_update_rejects_empty_data() {
        let mut params = map(json!({"data": {}}));
        assert!(validate_update(&mut params, &input("Project", "PROJ-0001")).is_err());
    }

    #[test]
    fn test_prompts_mention_established_values() {
        let prompt = update_prompt(&SynthesisInput {
            query: "set status to Open",
            doctype: "Task",
            entity_name: "TASK-0001",
        });
        assert!(prompt.contains("Document Name: \"TASK-0001\""));
        assert!(aggregate_prompt(&input("Sales Invoice", "")).contains("MUST be \"Sales Invoice\""));
    }
}
