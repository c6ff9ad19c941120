//! Response formatting
//!
//! The LLM path rewrites raw tool output under strict no-invention rules;
//! the deterministic path in [`fallback`] renders it structurally. Empty
//! payloads never reach the LLM, and a rate-limited LLM degrades to the
//! deterministic rendering plus an explicit note.

pub mod errors;
pub mod fallback;

pub use errors::{extract_core_error_message, format_error_text, format_upstream_error, ErrorKind};
pub use fallback::{detect_shape, format_without_llm, is_empty_payload, no_results, DataShape, RequestedFormat};

use crate::dispatch::ToolOutput;
use crate::llm::{ChatMessage, LLMClient};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Note appended when AI formatting was skipped because of rate limiting
pub const RATE_LIMIT_NOTE: &str =
    "⚠️ AI formatting is temporarily unavailable (rate limit reached). Showing the raw results instead.";

const MAX_PROMPT_DATA_CHARS: usize = 12_000;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"(?i)\b(?:item|entry|record)\s+\d+\b").unwrap();
}

const FORMAT_SYSTEM_PROMPT: &str =
    "You are a data formatter that turns JSON from an ERPNext system into user-friendly text. \
     You only ever restate data you were given.";

/// Coarse quality tag of a response; says nothing about semantic correctness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    High,
    Medium,
    Low,
    Error,
    RateLimited,
    NotApplicable,
}

impl DataQuality {
    /// Length-based tag for successful responses
    pub fn from_length(len: usize) -> Self {
        if len > 1000 {
            Self::High
        } else if len > 100 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Error => "error",
            Self::RateLimited => "rate_limited",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResponse {
    pub text: String,
    pub data_quality: DataQuality,
}

impl FormattedResponse {
    fn measured(text: String) -> Self {
        let data_quality = DataQuality::from_length(text.len());
        Self { text, data_quality }
    }

    fn rate_limited(text: String) -> Self {
        Self {
            text: format!("{}\n\n{}", text, RATE_LIMIT_NOTE),
            data_quality: DataQuality::RateLimited,
        }
    }
}

/// Turns tool output into user-facing text
pub struct ResponseFormatter {
    client: Option<Arc<dyn LLMClient>>,
}

impl ResponseFormatter {
    pub fn new(client: Option<Arc<dyn LLMClient>>) -> Self {
        Self { client }
    }

    /// Format one tool result.
    ///
    /// `rate_limited` is set when the LLM already answered 429 earlier in
    /// the request; the LLM is then not called again.
    pub async fn format(&self, query: &str, output: &ToolOutput, rate_limited: bool) -> FormattedResponse {
        let fallback = || format_without_llm(query, &output.payload);

        if rate_limited {
            return FormattedResponse::rate_limited(fallback());
        }
        if is_empty_payload(&output.payload) {
            return FormattedResponse::measured(no_results(query));
        }
        let Some(client) = self.client.as_ref() else {
            return FormattedResponse::measured(fallback());
        };

        let messages = vec![
            ChatMessage::system(FORMAT_SYSTEM_PROMPT),
            ChatMessage::user(build_format_prompt(query, output)),
        ];

        match client.chat_completion(messages).await {
            Ok(text) => {
                let text = text.trim();
                let raw = output.payload.to_string();
                if text.is_empty() {
                    tracing::warn!("LLM formatter returned nothing, using fallback formatting");
                    FormattedResponse::measured(fallback())
                } else if introduces_placeholders(text, &raw) {
                    tracing::warn!("LLM formatter invented placeholder entries, using fallback formatting");
                    FormattedResponse::measured(fallback())
                } else {
                    FormattedResponse::measured(text.to_string())
                }
            }
            Err(e) if e.is_rate_limit() => {
                tracing::warn!(error = %e, "LLM rate limited during formatting, degrading");
                FormattedResponse::rate_limited(fallback())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to format response with LLM, using fallback formatting");
                FormattedResponse::measured(fallback())
            }
        }
    }
}

/// Whether `text` mentions placeholder entries ("Item 1") absent from the raw data
pub fn introduces_placeholders(text: &str, raw: &str) -> bool {
    let raw_lower = raw.to_lowercase();
    PLACEHOLDER_RE
        .find_iter(text)
        .any(|m| !raw_lower.contains(&m.as_str().to_lowercase()))
}

fn build_format_prompt(query: &str, output: &ToolOutput) -> String {
    let mut raw = serde_json::to_string_pretty(&output.payload).unwrap_or_else(|_| output.payload.to_string());
    if raw.chars().count() > MAX_PROMPT_DATA_CHARS {
        raw = raw.chars().take(MAX_PROMPT_DATA_CHARS).collect::<String>() + "\n... (truncated)";
    }
    let summary = &output.summary;
    let format_hint = RequestedFormat::detect(query).instruction();

    format!(
        r#"CRITICAL RULES:
1. NEVER MAKE UP OR INVENT DATA. Only format what is actually in the raw data.
2. If the raw data contains an error message, explain the error clearly. Do not present it as a success.
3. If the raw data is empty or has no results, say so explicitly.
4. DO NOT add placeholder entries like "Item 1", "Item 2".

User's Question: "{query}"
Tool Summary: {summary}
Raw Data:
{raw}

FORMAT: {format_hint}

MARKDOWN TABLE FORMAT:
| Column1 | Column2 |
|---------|---------|
| Value1  | Value2  |

Example with real data:
User: "show companies in table format"
Data: {{"data":[{{"name":"VK","company_name":"VK Corp"}}],"total_count":1}}
Response:
| Name | Company Name |
|------|--------------|
| VK   | VK Corp      |

Total: 1 company

Now format the user's data."#
    )
}
