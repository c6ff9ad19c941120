//! Error-aware formatting of upstream failures

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::fmt::Write;

lazy_static! {
    static ref LABELLED_MESSAGE_RES: Vec<Regex> = vec![
        Regex::new(r"Error:\s*(.+?)(?:\n|$)").unwrap(),
        Regex::new(r"Exception:\s*(.+?)(?:\n|$)").unwrap(),
        Regex::new(r"Message:\s*(.+?)(?:\n|$)").unwrap(),
    ];
}

const ERROR_PREFIX: &str = "Error processing query:";

/// Failure families with their own remediation hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FiscalYear,
    Authentication,
    Permission,
    NotFound,
    MissingField,
    Validation,
    Generic,
}

impl ErrorKind {
    /// Classify by substring, most specific first
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["fiscal year"]) {
            Self::FiscalYear
        } else if has(&["authentication", "unauthorized", "401"]) {
            Self::Authentication
        } else if has(&["permission", "forbidden", "403"]) {
            Self::Permission
        } else if has(&["not found", "404", "does not exist"]) {
            Self::NotFound
        } else if has(&["mandatory", "required"]) {
            Self::MissingField
        } else if has(&["validation", "invalid"]) {
            Self::Validation
        } else {
            Self::Generic
        }
    }
}

/// Pull the human-readable part out of a verbose backend error
pub fn extract_core_error_message(error_msg: &str) -> String {
    if let Some(message) = frappe_json_message(error_msg) {
        return message;
    }

    for re in LABELLED_MESSAGE_RES.iter() {
        if let Some(caps) = re.captures(error_msg) {
            return caps[1].trim().to_string();
        }
    }

    let first_line = error_msg.lines().next().unwrap_or_default().trim();
    first_line
        .strip_prefix(ERROR_PREFIX)
        .unwrap_or(first_line)
        .trim()
        .to_string()
}

/// `exception` (after its `module.Type:` prefix) or the first `_server_messages` entry
fn frappe_json_message(error_msg: &str) -> Option<String> {
    let start = error_msg.find('{')?;
    let body: Value = serde_json::from_str(error_msg[start..].trim()).ok()?;

    if let Some(exception) = body.get("exception").and_then(Value::as_str) {
        return Some(match exception.split_once(':') {
            Some((_, message)) => message.trim().to_string(),
            None => exception.to_string(),
        });
    }

    // _server_messages is a JSON string holding a JSON array of JSON strings
    let server_messages = body.get("_server_messages").and_then(Value::as_str)?;
    let messages: Vec<Value> = serde_json::from_str(server_messages).ok()?;
    let first = messages.first()?;
    let parsed = match first {
        Value::String(inner) => serde_json::from_str::<Value>(inner).unwrap_or_else(|_| first.clone()),
        other => other.clone(),
    };
    match parsed {
        Value::Object(ref obj) => obj.get("message").and_then(Value::as_str).map(String::from),
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Conversational explanation of an upstream failure with targeted hints
pub fn format_upstream_error(error_msg: &str) -> String {
    let core = extract_core_error_message(error_msg);
    let mut out = String::from("❌ **I couldn't complete that request**\n\n");

    let (issue, steps, tip): (String, [&str; 3], &str) = match ErrorKind::classify(&core) {
        ErrorKind::FiscalYear => (
            "**The issue**: The dates you specified aren't in an active fiscal year.\n\n\
             **What this means**: Financial reports need a fiscal year covering the requested dates.".to_string(),
            [
                "Go to **Accounts → Fiscal Year** in ERPNext",
                "Create a fiscal year that includes your date range",
                "Or try dates within an existing fiscal year",
            ],
            "💡 **Tip**: Ask your finance team or admin which fiscal years are active.",
        ),
        ErrorKind::Authentication => (
            "**The issue**: I couldn't authenticate with your ERPNext system.".to_string(),
            [
                "Check that your API credentials are correct",
                "Verify the API key hasn't expired",
                "Make sure you have permission to access this data",
            ],
            "💡 **Need help?** Contact your ERPNext administrator.",
        ),
        ErrorKind::Permission => (
            "**The issue**: You don't have permission to access this information.".to_string(),
            [
                "Ask your administrator to grant you the necessary permissions",
                "Try accessing different data you have permission for",
                "Log in with an account that has the right access",
            ],
            "💡 **Tip**: Different reports require different permission levels.",
        ),
        ErrorKind::NotFound => (
            "**The issue**: The item you're looking for doesn't exist.".to_string(),
            [
                "Check the spelling of names or IDs",
                "Verify the item hasn't been deleted",
                "Try searching for similar items",
            ],
            "💡 **Tip**: Try asking \"List all [items]\" to see what's available.",
        ),
        ErrorKind::MissingField => (
            "**The issue**: Some required information is missing.".to_string(),
            [
                "Make sure you've provided all required details",
                "Try adding company name, dates, or other filters",
                "Ask me \"What do I need for [report name]?\"",
            ],
            "💡 **Tip**: Most financial reports need a company and a date range.",
        ),
        ErrorKind::Validation => (
            "**The issue**: Some of the information provided isn't valid.".to_string(),
            [
                "Check date formats (try YYYY-MM-DD)",
                "Verify company or customer names are spelled correctly",
                "Make sure numerical values are in the right format",
            ],
            "💡 **Tip**: Try rephrasing your question or providing different values.",
        ),
        ErrorKind::Generic => (
            format!("**What happened**: {}", core),
            [
                "Try rephrasing your question",
                "Check if all required information is provided",
                "Verify the data exists in your system",
            ],
            "💡 **Need help?** Try asking me how to do what you need.",
        ),
    };

    out.push_str(&issue);
    out.push_str("\n\n**How to fix it**:\n");
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, step);
    }
    out.push('\n');
    out.push_str(tip);
    out
}

/// Error-looking text found inside a tool payload
pub fn format_error_text(error_text: &str) -> String {
    let mut out = String::from("❌ **Oops! Something went wrong**\n\n");

    let (issue, hints): (&str, [&str; 2]) = match ErrorKind::classify(error_text) {
        ErrorKind::Authentication => (
            "Authentication failed",
            ["Check your API credentials", "Verify your ERPNext permissions"],
        ),
        ErrorKind::NotFound => (
            "The requested item wasn't found",
            ["Check the spelling of names/IDs", "Verify the item exists in your system"],
        ),
        ErrorKind::Permission => (
            "Permission denied",
            ["Ask your administrator for access", "Try a different query you have permission for"],
        ),
        _ => (
            "The query couldn't be completed",
            ["Try rephrasing your question", "Check if all required information is provided"],
        ),
    };

    let _ = writeln!(out, "**Issue**: {}\n", issue);
    out.push_str("**What you can do**:\n");
    for hint in hints {
        let _ = writeln!(out, "- {}", hint);
    }
    let _ = write!(
        out,
        "\n<details>\n<summary>Technical details</summary>\n\n```\n{}\n```\n</details>",
        error_text
    );
    out
}
