//! Deterministic rendering of tool payloads
//!
//! Used whenever the LLM formatter is unavailable, failed, or produced
//! something untrustworthy. Pure: the same `(query, payload)` always yields
//! the same text.

use super::errors::format_error_text;
use serde_json::{Map, Value};
use std::fmt::Write;

const MAX_TABLE_COLUMNS: usize = 8;
const MAX_TABLE_ROWS: usize = 20;
const MAX_LIST_ITEMS: usize = 20;
const MAX_CELL_CHARS: usize = 50;
const SUMMARY_FIELDS: usize = 5;

const NAME_FIELDS: &[&str] = &["name", "id", "title"];
const DESCRIPTION_FIELDS: &[&str] = &["description", "company_name", "customer_name", "title"];
const KEY_FIELDS: &[&str] = &[
    "status",
    "company",
    "customer",
    "supplier",
    "project",
    "title",
    "description",
];

/// Output shape asked for in the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedFormat {
    Table,
    List,
    Summary,
    Auto,
}

impl RequestedFormat {
    pub fn detect(query: &str) -> Self {
        let lower = query.to_lowercase();
        if lower.contains("table") {
            Self::Table
        } else if lower.contains("list") || lower.contains("bullet") {
            Self::List
        } else if lower.contains("summary") || lower.contains("summarize") {
            Self::Summary
        } else {
            Self::Auto
        }
    }

    /// Prompt guidance for the LLM formatter
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Table => "The user asked for a table: use a Markdown table with | separators.",
            Self::List => "The user asked for a list: use bullet points (-).",
            Self::Summary => "The user asked for a summary: write a brief summary.",
            Self::Auto => "No format requested: use the most legible format for this data.",
        }
    }
}

/// Structural family of a payload, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataShape {
    Empty,
    Text,
    Report,
    List,
    Document,
    Summary,
}

/// Whether a payload carries no records at all
pub fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => {
            map.is_empty() || map.get("data").and_then(Value::as_array).is_some_and(Vec::is_empty)
        }
        _ => false,
    }
}

pub fn detect_shape(payload: &Value) -> DataShape {
    if is_empty_payload(payload) {
        return DataShape::Empty;
    }
    let map = match payload {
        Value::String(_) => return DataShape::Text,
        Value::Object(map) => map,
        _ => return DataShape::Summary,
    };

    let has_array = |key: &str| map.get(key).is_some_and(Value::is_array);
    if has_array("columns") && has_array("data") {
        DataShape::Report
    } else if has_array("data") {
        DataShape::List
    } else if document_of(map).is_some() {
        DataShape::Document
    } else {
        DataShape::Summary
    }
}

/// Render a payload without any LLM
pub fn format_without_llm(query: &str, payload: &Value) -> String {
    let requested = RequestedFormat::detect(query);
    match (detect_shape(payload), payload) {
        (DataShape::Empty, _) => no_results(query),
        (DataShape::Text, Value::String(text)) => {
            if text.to_lowercase().contains("error") {
                format_error_text(text)
            } else {
                format!("Here's what I found:\n\n{}", text)
            }
        }
        (DataShape::Report, Value::Object(map)) => format_report(map),
        (DataShape::List, Value::Object(map)) => format_list(map, requested),
        (DataShape::Document, Value::Object(map)) => format_document(map),
        (_, other) => format_summary(other),
    }
}

/// Explicit empty-result statement
pub fn no_results(query: &str) -> String {
    format!(
        "No results found for: \"{}\"\n\n\
         💡 **Suggestions**:\n\
         - Check if the filters are too restrictive\n\
         - Try a broader date range\n\
         - Verify the spelling of names or IDs\n\
         - Make sure the data exists in your system",
        query.trim()
    )
}

fn format_report(map: &Map<String, Value>) -> String {
    let columns = map.get("columns").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    let rows = map.get("data").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();

    let title = map
        .get("report_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("Report Results");
    let mut out = format!("📊 **{}**\n\n", title);

    if rows.is_empty() {
        out.push_str("No results found for the specified criteria.\n\n💡 Try adjusting your filters or date range.");
        return out;
    }

    let headers: Vec<(String, Option<String>)> = columns.iter().map(column_header).collect();
    let table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(format_cell).collect(),
            Value::Object(obj) => headers
                .iter()
                .map(|(label, field)| {
                    let key = field.as_deref().unwrap_or(label.as_str());
                    format_cell(obj.get(key).unwrap_or(&Value::Null))
                })
                .collect(),
            other => vec![format_cell(other)],
        })
        .collect();

    let labels: Vec<String> = headers.into_iter().map(|(label, _)| label).collect();
    out.push_str(&markdown_table(&labels, &table_rows));
    let _ = write!(out, "\n\n📈 **Summary**: {} row(s) returned", rows.len());
    out
}

/// `(label, fieldname)` of a report column descriptor
fn column_header(column: &Value) -> (String, Option<String>) {
    match column {
        Value::Object(obj) => {
            let field = obj.get("fieldname").and_then(Value::as_str).map(String::from);
            let label = obj
                .get("label")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| field.clone())
                .unwrap_or_else(|| "-".to_string());
            (label, field)
        }
        // "Label:Type/Options:Width" string columns
        Value::String(s) => {
            let label = s.split(':').next().unwrap_or(s.as_str()).to_string();
            (label, None)
        }
        other => (other.to_string(), None),
    }
}

/// Markdown table capped at [`MAX_TABLE_COLUMNS`] x [`MAX_TABLE_ROWS`]
fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let total_cols = headers.len().max(rows.iter().map(Vec::len).max().unwrap_or(0));
    let display_cols = total_cols.min(MAX_TABLE_COLUMNS);
    if display_cols == 0 {
        return "No data available.".to_string();
    }

    let mut table = String::from("|");
    for i in 0..display_cols {
        let header = headers.get(i).map(String::as_str).unwrap_or("-");
        let _ = write!(table, " {} |", escape_cell(header));
    }
    table.push_str("\n|");
    for _ in 0..display_cols {
        table.push_str("---|");
    }
    table.push('\n');

    for row in rows.iter().take(MAX_TABLE_ROWS) {
        table.push('|');
        for i in 0..display_cols {
            let cell = row.get(i).map(String::as_str).unwrap_or("-");
            let _ = write!(table, " {} |", escape_cell(cell));
        }
        table.push('\n');
    }

    if rows.len() > MAX_TABLE_ROWS {
        let _ = write!(table, "\n*...and {} more rows*", rows.len() - MAX_TABLE_ROWS);
    }
    if total_cols > MAX_TABLE_COLUMNS {
        let _ = write!(table, " (showing {} of {} columns)", display_cols, total_cols);
    }
    table
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

/// Display form of one value: `-` for null, integral floats without decimals,
/// long text cut to 50 characters.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => truncate(s),
        Value::Bool(true) => "✓".to_string(),
        Value::Bool(false) => "✗".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            (None, Some(f)) => format!("{:.2}", f),
            _ => n.to_string(),
        },
        other => truncate(&other.to_string()),
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_CELL_CHARS {
        let head: String = s.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn first_string<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn format_list(map: &Map<String, Value>, requested: RequestedFormat) -> String {
    let items = map.get("data").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    if items.is_empty() {
        return "No results found matching your criteria.\n\n💡 Try adjusting your search terms.".to_string();
    }

    if requested == RequestedFormat::Table {
        if let Some(table) = list_as_table(items) {
            return format!("Found {} item(s):\n\n{}", items.len(), table);
        }
    }

    let mut out = format!("Found {} item(s):\n\n", items.len());
    for item in items.iter().take(MAX_LIST_ITEMS) {
        match item {
            Value::Object(obj) => match first_string(obj, NAME_FIELDS) {
                Some(name) => {
                    let _ = write!(out, "• **{}**", name);
                    if let Some(desc) = first_string(obj, DESCRIPTION_FIELDS).filter(|d| *d != name) {
                        let _ = write!(out, ": {}", truncate(desc));
                    }
                    out.push('\n');
                }
                None => {
                    let fields = obj
                        .iter()
                        .take(3)
                        .map(|(k, v)| format!("{}: {}", k, format_cell(v)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let _ = writeln!(out, "• {}", fields);
                }
            },
            other => {
                let _ = writeln!(out, "• {}", format_cell(other));
            }
        }
    }

    if items.len() > MAX_LIST_ITEMS {
        let _ = write!(out, "\n*...and {} more items*", items.len() - MAX_LIST_ITEMS);
    }
    out
}

/// Table over the keys of the first record
fn list_as_table(items: &[Value]) -> Option<String> {
    let first = items.first()?.as_object()?;
    let headers: Vec<String> = first.keys().cloned().collect();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            headers
                .iter()
                .map(|h| format_cell(item.get(h).unwrap_or(&Value::Null)))
                .collect()
        })
        .collect();
    Some(markdown_table(&headers, &rows))
}

/// The record a document-shaped payload is about: the payload itself, or a
/// nested `document` / `project`
fn document_of(map: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if map.contains_key("name") && !map.contains_key("document") {
        return Some(map);
    }
    ["document", "project"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_object))
        .find(|doc| doc.contains_key("name"))
}

fn format_document(map: &Map<String, Value>) -> String {
    let Some(doc) = document_of(map) else {
        return format_summary(&Value::Object(map.clone()));
    };

    let doctype = first_string(doc, &["doctype", "type"]).or_else(|| first_string(map, &["doctype"]));
    let name = first_string(doc, &["name", "id"]);

    let mut out = match (doctype, name) {
        (Some(doctype), Some(name)) => format!("📄 **{}**: {}\n\n", doctype, name),
        (None, Some(name)) => format!("📄 **{}**\n\n", name),
        _ => String::new(),
    };

    for field in KEY_FIELDS {
        if let Some(value) = first_string(doc, &[*field]) {
            let _ = writeln!(out, "**{}**: {}", title_case(*field), truncate(value));
        }
    }

    if map.get("deleted").and_then(Value::as_bool) == Some(true) {
        out.push_str("\n✅ Document deleted");
    }
    let _ = write!(out, "\n*Document has {} fields total*", doc.len());
    out
}

fn title_case(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_summary(payload: &Value) -> String {
    let mut out = String::from("📋 **Query Results**\n\n**Data structure**:\n");
    match payload {
        Value::Object(map) => {
            for (key, value) in map.iter().take(SUMMARY_FIELDS) {
                let _ = writeln!(out, "- {}: {}", key, format_cell(value));
            }
            if map.len() > SUMMARY_FIELDS {
                let _ = writeln!(out, "- ...and {} more fields", map.len() - SUMMARY_FIELDS);
            }
        }
        other => {
            let _ = writeln!(out, "- {}", format_cell(other));
        }
    }
    out.push_str("\n💡 For better formatting, try asking in a more specific way.");
    out
}
