//! Error types for docquery

use thiserror::Error;

/// Result type alias using DocQueryError
pub type Result<T> = std::result::Result<T, DocQueryError>;

/// Error type alias for convenience
pub type Error = DocQueryError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for docquery
#[derive(Debug, Error)]
pub enum DocQueryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The LLM could not be reached or did not answer with usable JSON.
    #[error("intent classification failed: {0}")]
    Classification(String),

    /// Upstream LLM refused the call because of rate limiting (HTTP 429).
    #[error("LLM rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("no {doctype} found matching '{term}'")]
    EntityNotFound { doctype: String, term: String },

    #[error("failed to process {action} query: {reason}")]
    ParameterSynthesis { action: String, reason: String },

    /// Document store failure; the message keeps the provider diagnostics verbatim.
    #[error("{0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl DocQueryError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EntityNotFound { .. } => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// Whether this error means the LLM provider is rate limiting us.
    ///
    /// Providers report this inconsistently, so besides the dedicated variant
    /// any message mentioning `429` or `rate limit` counts.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            other => is_rate_limit_message(&other.to_string()),
        }
    }

    /// Whether the error came from the document store.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Substring check used for rate-limit detection on raw error text.
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429") || lower.contains("rate limit")
}
